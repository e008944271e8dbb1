//! Completion error types

use std::time::Duration;
use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Failure of a language model invocation.
///
/// All variants are fatal for the request that triggered them; retrying is
/// left to the backend implementation.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network or HTTP transport failure
    #[error("model transport error: {message}")]
    Transport {
        /// Underlying failure description
        message: String,
    },

    /// The provider answered with a non-success status
    #[error("model provider returned {status}: {body}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Quota or rate limit exhausted
    #[error("model quota exhausted: {message}")]
    Quota {
        /// Provider message
        message: String,
    },

    /// The call did not finish within its budget
    #[error("model call timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Elapsed budget
        after: Duration,
    },

    /// The provider answered but the payload was unusable
    #[error("malformed model response: {message}")]
    MalformedResponse {
        /// What was wrong with the payload
        message: String,
    },

    /// The client is not configured (missing API key, bad URL)
    #[error("model configuration error: {message}")]
    Config {
        /// What is missing
        message: String,
    },
}

impl LlmError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        LlmError::Transport {
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        LlmError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        LlmError::Config {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > 500 {
            let cut = (0..=500).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
            body.truncate(cut);
        }
        if status == 429 {
            LlmError::Quota { message: body }
        } else {
            LlmError::Provider { status, body }
        }
    }

    /// Whether the caller could reasonably try again later
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport { .. } | LlmError::Quota { .. } | LlmError::Timeout { .. } => true,
            LlmError::Provider { status, .. } => *status >= 500,
            LlmError::MalformedResponse { .. } | LlmError::Config { .. } => false,
        }
    }
}
