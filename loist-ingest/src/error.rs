//! Transport adapters over [`loist_common::Error`]: the HTTP surface turns
//! it into the `{success:false, ...}` envelope with the right status code;
//! the RPC surface turns it into an `rmcp::ErrorData`.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};

use loist_common::{Error, ErrorEnvelope};

pub type ApiResult<T> = Result<T, ApiError>;

/// Newtype so `loist_common::Error` can implement axum's `IntoResponse`
/// without `loist-common` depending on axum.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = ErrorEnvelope::from(&self.0);
        (status, Json(envelope)).into_response()
    }
}

/// Converts a failure into the `rmcp` tool-call error shape, preserving
/// the kind and message in `data` so clients can branch on it the same way
/// HTTP callers branch on the envelope's `error` field.
pub fn to_rpc_error(err: &Error) -> rmcp::model::ErrorData {
    rmcp::model::ErrorData::invalid_params(
        err.message.clone(),
        Some(serde_json::json!({ "error": err.kind, "retriable": err.retriable })),
    )
}

