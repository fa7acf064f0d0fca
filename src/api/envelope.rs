//! Response envelope shared by every REST endpoint.
//!
//! Success: `{"status": "success", "data": ...}` (some endpoints add
//! top-level fields next to `data`). Error: `{"status": "error",
//! "detail": "..."}` with the matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

use crate::storage::StorageError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        (StatusCode::OK, Json(Self { status: "success", data })).into_response()
    }
}

/// Success envelope with extra top-level fields, e.g. `count`.
pub fn success_with(data: impl Serialize, extra: Value) -> Response {
    let mut body = Map::new();
    body.insert("status".into(), Value::from("success"));
    match serde_json::to_value(data) {
        Ok(v) => {
            body.insert("data".into(), v);
        }
        Err(e) => return ApiError::internal(format!("failed to encode response: {e}")).into_response(),
    }
    if let Value::Object(extra) = extra {
        body.extend(extra);
    }
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "status": "error", "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        error!(error = %e, "Storage error while handling request");
        Self::internal(format!("Storage error: {e}"))
    }
}
