//! Structured error responses.
//!
//! Every failure leaves the API as `{"error": {"code", "message"}}` with a
//! status chosen from the error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hookbin_core::{CoreError, HookbinError};
use serde::Serialize;
use tracing::error;

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code from the taxonomy (E1001-E3001)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Handler error wrapping the request-level taxonomy.
#[derive(Debug)]
pub struct ApiError(pub HookbinError);

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            HookbinError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            HookbinError::NotFound { .. } => StatusCode::NOT_FOUND,
            HookbinError::Validation(_) => StatusCode::BAD_REQUEST,
            HookbinError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Not-found error for a caller-supplied id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self(HookbinError::NotFound { id: id.into() })
    }
}

impl From<HookbinError> for ApiError {
    fn from(err: HookbinError) -> Self {
        Self(err)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(HookbinError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail { code: self.0.code().to_string(), message: self.0.to_string() },
        };
        (status, Json(body)).into_response()
    }
}
