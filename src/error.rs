//! Unified API error type and conversions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::authz::RegistryError;

/// Request-level failures, each mapping to one status code.
///
/// Backend error text is never surfaced to clients except for `TooLarge` and
/// `BadRequest`, where a human-readable message is intentional.
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Forbidden,
    TooLarge { limit: u64, size: u64 },
    UpstreamUnavailable { timed_out: bool },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            ApiError::TooLarge { limit, size } => (
                StatusCode::FORBIDDEN,
                format!("file too large: {size} bytes, limit is {limit}"),
            )
                .into_response(),
            ApiError::UpstreamUnavailable { timed_out } => {
                if timed_out {
                    StatusCode::GATEWAY_TIMEOUT.into_response()
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
            ApiError::Internal(msg) => {
                error!(error = msg, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Timeout => ApiError::UpstreamUnavailable { timed_out: true },
            RegistryError::Transport(msg) => {
                error!(error = msg, "namespace registry call failed");
                ApiError::UpstreamUnavailable { timed_out: false }
            }
        }
    }
}
