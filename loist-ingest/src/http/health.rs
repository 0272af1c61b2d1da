//! `/health` and `/ready` liveness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "loist-ingest",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Reports 200 only once the DB pool has served one successful `SELECT 1`
/// and the object-store gateway has completed one successful credential
/// resolution; 503 otherwise (`spec.md` §6 extension).
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    if state.readiness.is_ready() {
        (StatusCode::OK, Json(serde_json::json!({ "ready": true })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "ready": false })))
    }
}
