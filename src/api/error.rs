//! HTTP rendering of crate errors

use super::types::ErrorResponse;
use crate::error::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

/// Error returned by handlers
///
/// Client errors are logged at warn, server errors at error.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_client_error() {
            warn!(status = status.as_u16(), kind = self.0.kind(), error = %self.0, "Request rejected");
        } else {
            error!(status = status.as_u16(), kind = self.0.kind(), error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handler result type
pub type ApiResult<T> = std::result::Result<T, ApiError>;
