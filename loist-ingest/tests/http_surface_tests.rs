//! Router-level integration coverage for the embed/oEmbed/health surface
//! (component J), mirroring the teacher's `tests/api_integration_tests.rs`
//! use of `tower::ServiceExt` against an in-process router.
//!
//! Building the full `AppState` requires a live Postgres connection *and*
//! resolvable object-store credentials (there is no in-memory stand-in for
//! either, unlike the teacher's `sqlite::memory:`), so anything that needs
//! it is gated behind `#[ignore]` plus a `DATABASE_URL` runtime check, the
//! same way CI-only integration suites are typically gated.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use loist_ingest::cache::SignedUrlCache;
use loist_ingest::config::{DbConfig, ObjectStoreConfig, ServiceConfig, Transport};
use loist_ingest::orchestrator::Orchestrator;
use loist_ingest::storage::ObjectStoreGateway;
use loist_ingest::{AppState, Readiness};

fn test_config() -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        transport: Transport::Http,
        auth_enabled: false,
        bearer_token: None,
        log_level: "error".to_string(),
        log_format: loist_common::logging::LogFormat::Text,
        cors_allowlist: Vec::new(),
        db: DbConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "loist_test".to_string(),
            user: "loist".to_string(),
            password: String::new(),
            connection_name: None,
            min_connections: 1,
            max_connections: 2,
        },
        object_store: ObjectStoreConfig {
            bucket: "loist-test-bucket".to_string(),
            project: "loist-test".to_string(),
            region: "us-central1".to_string(),
            impersonate_service_account: None,
        },
        embed_base_url: "https://loist.test".to_string(),
        signed_url_ttl: Duration::from_secs(900),
    }
}

/// Requires `DATABASE_URL` and ambient GCP credentials; there is no
/// in-memory substitute for either dependency.
async fn build_live_app() -> axum::Router {
    let config = test_config();
    let pool = loist_ingest::db::init_pool(&config.db).await.expect("database reachable");
    let readiness = Readiness::new();
    readiness.mark_db_ready();

    let storage = ObjectStoreGateway::connect(config.object_store.bucket.clone(), None)
        .await
        .expect("object-store credentials resolvable");
    readiness.mark_storage_ready();

    let cache = SignedUrlCache::new(config.signed_url_ttl);
    let orchestrator = Orchestrator::new(pool, Arc::new(storage), Arc::new(cache), config.signed_url_ttl);
    let state = AppState::new(config, orchestrator, readiness);
    loist_ingest::build_router(state)
}

#[tokio::test]
async fn health_check_reports_ok_without_any_backing_state() {
    let router = axum::Router::new().route("/health", axum::routing::get(loist_ingest::http::health::health_check));

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "loist-ingest");
}

#[tokio::test]
#[ignore]
async fn ready_reports_503_before_backing_services_are_marked_ready_and_200_after() {
    if std::env::var("DATABASE_URL").is_err() {
        return;
    }
    let router = build_live_app().await;

    let response = router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn oembed_rejects_missing_url_parameter() {
    if std::env::var("DATABASE_URL").is_err() {
        return;
    }
    let router = build_live_app().await;

    let response = router
        .oneshot(Request::builder().uri("/oembed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn oembed_rejects_url_outside_the_configured_embed_base() {
    if std::env::var("DATABASE_URL").is_err() {
        return;
    }
    let router = build_live_app().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/oembed?url=https://not-loist.example/embed/550e8400-e29b-41d4-a716-446655440000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn oembed_discovery_document_advertises_the_embed_endpoint() {
    if std::env::var("DATABASE_URL").is_err() {
        return;
    }
    let router = build_live_app().await;

    let response = router
        .oneshot(Request::builder().uri("/.well-known/oembed.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["provider_name"], "loist");
}

#[tokio::test]
#[ignore]
async fn get_unknown_track_id_returns_not_found() {
    if std::env::var("DATABASE_URL").is_err() {
        return;
    }
    let router = build_live_app().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/embed/00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
