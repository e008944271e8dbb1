//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lephase::PipelineError;
use thiserror::Error;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned to HTTP clients as `{success: false, error, code, suggestion}`
#[derive(Debug, Clone, Error)]
#[error("[{status}] {code}: {message}")]
pub struct ApiError {
    /// HTTP status code
    pub status: StatusCode,

    /// Stable machine-readable code
    pub code: &'static str,

    /// Error message
    pub message: String,

    /// Hint for the caller
    pub suggestion: Option<&'static str>,
}

impl ApiError {
    /// Create an error with a status and code
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Attach a hint
    pub fn with_suggestion(mut self, suggestion: &'static str) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    /// 422, malformed or blank input
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// 500, server misconfiguration
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// 503, a collaborator is down or too slow
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// JSON body shared by plain responses and `error` stream events
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.message,
            "code": self.code,
            "suggestion": self.suggestion,
        })
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        let api = match &err {
            PipelineError::InvalidQuestion => ApiError::validation(message),
            PipelineError::IndexEmpty => ApiError::new(StatusCode::NOT_FOUND, err.code(), message),
            PipelineError::Model(_)
            | PipelineError::Timeout { .. }
            | PipelineError::Retrieval { .. }
            | PipelineError::Grading { .. }
            | PipelineError::Cancelled => ApiError::unavailable(message),
            PipelineError::Config { .. } => ApiError::internal(message),
        };

        match err.suggestion() {
            Some(hint) => api.with_suggestion(hint),
            None => api,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, code = self.code, "{}", self.message);
        }

        let body = Json(self.body());
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemodele::LlmError;
    use std::time::Duration;

    #[test]
    fn display_carries_status_and_code() {
        let error = ApiError::validation("source must not be empty");
        assert_eq!(
            error.to_string(),
            "[422 Unprocessable Entity] VALIDATION_ERROR: source must not be empty"
        );
    }

    #[test]
    fn invalid_question_is_422_with_hint() {
        let error = ApiError::from(PipelineError::InvalidQuestion);
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.suggestion, Some("Provide a non-empty question"));
    }

    #[test]
    fn empty_index_is_404_no_documents() {
        let error = ApiError::from(PipelineError::IndexEmpty);
        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.code, "NO_DOCUMENTS");
    }

    #[test]
    fn model_failures_are_503() {
        let down = ApiError::from(PipelineError::Model(LlmError::transport("refused")));
        assert_eq!(down.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.code, "SERVICE_UNAVAILABLE");

        let slow = ApiError::from(PipelineError::Timeout {
            stage: "model",
            after: Duration::from_secs(30),
        });
        assert_eq!(slow.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn body_carries_code_and_hint() {
        let body = ApiError::from(PipelineError::IndexEmpty).body();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NO_DOCUMENTS");
        assert!(body["suggestion"].is_string());
    }

    #[test]
    fn config_error_is_500() {
        let error = ApiError::from(PipelineError::config("bad thresholds"));
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
