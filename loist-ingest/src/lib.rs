//! loist-ingest library interface.
//!
//! Exposes `AppState`, the router builder, and every component module so
//! both the `loist-ingest` binary and the integration tests can drive the
//! same wiring.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod http;
pub mod metadata;
pub mod orchestrator;
pub mod rpc;
pub mod signature;
pub mod storage;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::orchestrator::Orchestrator;

/// Tracks the two preconditions `/ready` requires: one successful DB
/// round-trip, one successful object-store credential resolution
/// (`SPEC_FULL.md` §6). Both flip once and never flip back.
#[derive(Default)]
pub struct Readiness {
    db_ready: AtomicBool,
    storage_ready: AtomicBool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_db_ready(&self) {
        self.db_ready.store(true, Ordering::Relaxed);
    }

    pub fn mark_storage_ready(&self) {
        self.storage_ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.db_ready.load(Ordering::Relaxed) && self.storage_ready.load(Ordering::Relaxed)
    }
}

/// Application state shared across the HTTP router and the RPC tool
/// dispatcher: the explicit dependency bundle that replaces the teacher's
/// module-level globals (`SPEC_FULL.md` §9).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub readiness: Arc<Readiness>,
}

impl AppState {
    pub fn new(config: ServiceConfig, orchestrator: Orchestrator, readiness: Readiness) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            readiness: Arc::new(readiness),
        }
    }
}

/// Build the embed/oEmbed/health/ready router (component J). The RPC tool
/// surface (component I) is mounted separately depending on `TRANSPORT`
/// (see `main.rs`).
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowlist);
    http::routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `CORS_ALLOWLIST` (`spec.md` §6) turned into a `CorsLayer`: an explicit
/// list of origins when configured, permissive otherwise (embeds are
/// rendered cross-origin by design, so an empty allowlist is not a
/// lockdown default).
fn cors_layer(allowlist: &[String]) -> CorsLayer {
    if allowlist.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowlist
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any)
}
