//! The standardized error returned over the HTTP/WS surface (§6's envelope,
//! §7's status-code table). Wraps `imagegen_core::CoreError`; the mapping
//! to a status code lives here rather than on `CoreError` itself, since the
//! core is transport-agnostic.

use axum::{http::StatusCode, response::IntoResponse, Json};
use imagegen_core::CoreError;
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid multipart upload: {0}")]
    Multipart(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("there was an I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for HostError {
    fn into_response(self) -> axum::response::Response {
        let (status, error, message) = match &self {
            HostError::Core(core @ CoreError::Validation(m)) => {
                (StatusCode::BAD_REQUEST, core.kind(), m.clone())
            }
            HostError::Core(core @ CoreError::Auth(m)) => {
                (StatusCode::UNAUTHORIZED, core.kind(), m.clone())
            }
            HostError::Core(core @ CoreError::NotFound(m)) => {
                (StatusCode::NOT_FOUND, core.kind(), m.clone())
            }
            HostError::Core(core @ CoreError::InsufficientFunds { balance, required }) => (
                StatusCode::PAYMENT_REQUIRED,
                core.kind(),
                format!("balance {balance}, required {required}"),
            ),
            HostError::Core(other) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                other.kind(),
                other.to_string(),
            ),
            HostError::InvalidAddress(m) => (StatusCode::BAD_REQUEST, "invalid_address", m.clone()),
            HostError::Multipart(m) => (StatusCode::BAD_REQUEST, "multipart", m.clone()),
            HostError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "request body exceeds the per-image limit".to_string(),
            ),
            HostError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "io", e.to_string()),
        };

        (
            status,
            Json(json!({
                "success": false,
                "status": status.as_u16(),
                "error": error,
                "message": message,
            })),
        )
            .into_response()
    }
}

/// A type alias for the standardized result type returned by the host.
pub type HostResult<T> = Result<T, HostError>;
