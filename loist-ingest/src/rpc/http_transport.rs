//! Plain JSON-over-HTTP surface for the RPC tool surface when
//! `TRANSPORT=http` (`spec.md` §6, §4.I): one POST endpoint per tool name,
//! body is the tool's arguments, response is the tool's result decoded
//! back to a bare JSON value rather than wrapped in the MCP content
//! envelope `stdio`/`sse` clients see.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use rmcp::model::CallToolResult;

use crate::AppState;

use super::LoistService;

pub fn routes() -> Router<AppState> {
    Router::new().route("/rpc/:tool", post(call_tool))
}

async fn call_tool(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    headers: HeaderMap,
    body: Option<Json<serde_json::Value>>,
) -> Response {
    let bearer_token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let arguments = body.map(|Json(v)| v).unwrap_or(serde_json::Value::Null);
    let service = LoistService::new(state);
    let result = service.dispatch(&tool, arguments, bearer_token).await;
    result_to_response(result)
}

/// Unwraps the tool dispatcher's `CallToolResult` back to the bare JSON
/// value every tool already serializes into its first text content block.
fn result_to_response(result: CallToolResult) -> Response {
    let value = result
        .content
        .first()
        .and_then(|content| content.as_text())
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text.text).ok())
        .unwrap_or(serde_json::Value::Null);

    let status = if result.is_error.unwrap_or(false) {
        value["error"]
            .as_str()
            .map(error_kind_status)
            .unwrap_or(StatusCode::BAD_REQUEST)
    } else {
        StatusCode::OK
    };

    (status, Json(value)).into_response()
}

/// Maps an `ErrorKind`'s `SCREAMING_SNAKE_CASE` wire name back to the HTTP
/// status the embed/oEmbed surface would use for the same kind, so the
/// plain JSON-over-HTTP RPC transport reports the same statuses (`spec.md`
/// §7) rather than a blanket 400.
fn error_kind_status(kind: &str) -> StatusCode {
    match kind {
        "FETCH_FORBIDDEN" => StatusCode::FORBIDDEN,
        "FETCH_FAILED" | "STORAGE_ERROR" | "EXTERNAL_SERVICE_ERROR" => StatusCode::BAD_GATEWAY,
        "SIZE_EXCEEDED" => StatusCode::PAYLOAD_TOO_LARGE,
        "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        "FORMAT_INVALID" | "METADATA_EXTRACTION_FAILED" => StatusCode::UNPROCESSABLE_ENTITY,
        "DATABASE_ERROR" | "INTERNAL_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
        "STATE_CONFLICT" => StatusCode::CONFLICT,
        "RESOURCE_NOT_FOUND" => StatusCode::NOT_FOUND,
        "VALIDATION_ERROR" | "INVALID_QUERY" => StatusCode::BAD_REQUEST,
        "AUTHENTICATION_FAILED" => StatusCode::UNAUTHORIZED,
        "RATE_LIMIT_EXCEEDED" => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_authentication_and_not_found_kinds_to_their_spec_status() {
        assert_eq!(error_kind_status("AUTHENTICATION_FAILED"), StatusCode::UNAUTHORIZED);
        assert_eq!(error_kind_status("RESOURCE_NOT_FOUND"), StatusCode::NOT_FOUND);
        assert_eq!(error_kind_status("INVALID_QUERY"), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind_status("SIZE_EXCEEDED"), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
