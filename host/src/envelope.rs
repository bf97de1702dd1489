//! The standard response envelope (§6): `{success, status, message?, data?,
//! error?}`. Error responses build their own shape in `error.rs`'s
//! `IntoResponse`; this covers the success side every handler returns
//! through.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

pub struct Envelope<T> {
    status: StatusCode,
    data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        Self { status, data }
    }

    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::OK, data)
    }

    pub fn accepted(data: T) -> Self {
        Self::new(StatusCode::ACCEPTED, data)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(json!({
                "success": true,
                "status": self.status.as_u16(),
                "data": self.data,
            })),
        )
            .into_response()
    }
}
