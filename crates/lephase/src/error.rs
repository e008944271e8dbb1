use std::time::Duration;

use lemodele::LlmError;
use lerecherche::{GradeError, RetrievalError};
use thiserror::Error;

/// Fatal pipeline failures.
///
/// Quality rejections and risk vetoes are not errors; they are carried in the
/// pipeline state.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Blank or missing question
    #[error("question must not be empty")]
    InvalidQuestion,

    /// No documents have been ingested
    #[error("no documents indexed")]
    IndexEmpty,

    /// The retriever could not be queried
    #[error("retrieval failed: {message}")]
    Retrieval {
        /// Underlying failure
        message: String,
    },

    /// The relevance judge failed for a reason other than the model
    #[error("document grading failed: {message}")]
    Grading {
        /// Underlying failure
        message: String,
    },

    /// A model call failed
    #[error("model call failed: {0}")]
    Model(#[source] LlmError),

    /// A collaborator call exceeded its budget
    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Which call timed out
        stage: &'static str,
        /// Elapsed budget
        after: Duration,
    },

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Inconsistent configuration
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong
        message: String,
    },
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config {
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidQuestion => "INVALID_QUESTION",
            PipelineError::IndexEmpty => "NO_DOCUMENTS",
            PipelineError::Retrieval { .. } => "RETRIEVAL_UNAVAILABLE",
            PipelineError::Grading { .. } => "GRADING_FAILED",
            PipelineError::Model(_) => "MODEL_UNAVAILABLE",
            PipelineError::Timeout { .. } => "TIMEOUT",
            PipelineError::Cancelled => "CANCELLED",
            PipelineError::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// Whether the same request may succeed later
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::Retrieval { .. }
            | PipelineError::Timeout { .. }
            | PipelineError::Cancelled => true,
            PipelineError::Model(err) => err.is_transient(),
            PipelineError::InvalidQuestion
            | PipelineError::IndexEmpty
            | PipelineError::Grading { .. }
            | PipelineError::Config { .. } => false,
        }
    }

    /// Hint for the caller
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            PipelineError::InvalidQuestion => Some("Provide a non-empty question"),
            PipelineError::IndexEmpty => Some("Upload tender documents before asking questions"),
            PipelineError::Model(LlmError::Config { .. }) => {
                Some("Set the model API key environment variable")
            }
            PipelineError::Model(_) | PipelineError::Timeout { .. } => {
                Some("The language model is unavailable; try again later")
            }
            PipelineError::Config { .. } => Some("Check the [pipeline] table of the config file"),
            _ => None,
        }
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout { after } => PipelineError::Timeout {
                stage: "model",
                after,
            },
            other => PipelineError::Model(other),
        }
    }
}

impl From<RetrievalError> for PipelineError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::IndexEmpty => PipelineError::IndexEmpty,
            RetrievalError::Unavailable { message } => PipelineError::Retrieval { message },
        }
    }
}

impl From<GradeError> for PipelineError {
    fn from(err: GradeError) -> Self {
        match err {
            GradeError::Model(llm) => llm.into(),
            GradeError::Judge { message } => PipelineError::Grading { message },
        }
    }
}
