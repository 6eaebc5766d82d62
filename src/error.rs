use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure of one analysis request, one variant per pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("image could not be read: {0}")]
    ImageUnreadable(String),

    #[error("LLM request failed: {0}")]
    Upstream(String),

    #[error("LLM returned malformed output: {0}")]
    MalformedOutput(String),
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidRequest(_) => "invalid_request",
            AnalysisError::ImageNotFound(_) => "image_not_found",
            AnalysisError::ImageUnreadable(_) => "image_unreadable",
            AnalysisError::Upstream(_) => "upstream_failure",
            AnalysisError::MalformedOutput(_) => "malformed_model_output",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AnalysisError::ImageNotFound(_) => StatusCode::NOT_FOUND,
            AnalysisError::ImageUnreadable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AnalysisError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AnalysisError::MalformedOutput(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    kind: &'static str,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
            kind: self.kind(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
