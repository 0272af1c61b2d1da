//! loist-ingest — audio ingest service.
//!
//! Wires the component bundle (signature validator, metadata extractor,
//! HTTP fetcher, object-store gateway, signed-URL cache, metadata store,
//! ingestion orchestrator) into the RPC tool surface and the embed/oEmbed
//! HTTP surface, per the configured transport.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rmcp::ServiceExt;
use tracing::{error, info};

use loist_ingest::cache::SignedUrlCache;
use loist_ingest::config::{ServiceConfig, Transport};
use loist_ingest::orchestrator::Orchestrator;
use loist_ingest::rpc::LoistService;
use loist_ingest::storage::ObjectStoreGateway;
use loist_ingest::{AppState, Readiness};

const RECLAIM_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env().context("loading configuration from environment")?;
    loist_common::logging::init(&config.log_level, config.log_format);

    info!(
        transport = ?config.transport,
        version = env!("CARGO_PKG_VERSION"),
        "starting loist-ingest"
    );

    let pool = loist_ingest::db::init_pool(&config.db)
        .await
        .context("initializing database pool and running migrations")?;
    let readiness = Readiness::new();
    loist_ingest::db::health_probe(&pool).await.context("initial database health probe")?;
    readiness.mark_db_ready();
    info!("database ready");

    let storage = ObjectStoreGateway::connect(
        config.object_store.bucket.clone(),
        config.object_store.impersonate_service_account.clone(),
    )
    .await
    .context("connecting object-store gateway")?;
    readiness.mark_storage_ready();
    info!(bucket = %config.object_store.bucket, "object-store gateway ready");

    let cache = SignedUrlCache::new(config.signed_url_ttl);
    let orchestrator = Orchestrator::new(pool, Arc::new(storage), Arc::new(cache), config.signed_url_ttl);

    let state = AppState::new(config, orchestrator, readiness);

    spawn_reclaim_loop(state.clone());

    match state.config.transport {
        Transport::Stdio => run_stdio(state).await,
        Transport::Http => run_http(state).await,
        Transport::Sse => run_sse(state).await,
    }
}

/// `reclaim()` (`spec.md` §4.H) as a scheduled background task,
/// single-flighted internally by the orchestrator's keyed mutex.
fn spawn_reclaim_loop(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RECLAIM_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = state.orchestrator.reclaim().await {
                error!(error = %err, "orphan reclamation sweep failed");
            }
        }
    });
}

fn bind_addr(config: &ServiceConfig) -> anyhow::Result<std::net::SocketAddr> {
    format!("{}:{}", config.host, config.port)
        .parse()
        .context("parsing HOST:PORT into a socket address")
}

/// `stdio` transport: the RPC tool surface talks MCP over stdin/stdout;
/// the embed/oEmbed HTTP surface (component J) still runs, since it is a
/// separate externally-facing surface consumed by third-party unfurlers,
/// not an alternative to the RPC transport.
async fn run_stdio(state: AppState) -> anyhow::Result<()> {
    let addr = bind_addr(&state.config)?;
    let router = loist_ingest::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding HTTP listener")?;

    let mcp_state = state.clone();
    let mcp_handle = tokio::spawn(async move {
        let service = LoistService::new(mcp_state);
        match service.serve(rmcp::transport::stdio()).await {
            Ok(running) => {
                if let Err(err) = running.waiting().await {
                    error!(error = %err, "stdio MCP transport ended with an error");
                }
            }
            Err(err) => error!(error = %err, "failed to start stdio MCP transport"),
        }
    });

    info!(%addr, "embed/oEmbed HTTP surface listening");
    let serve_result = axum::serve(listener, router).await.context("serving HTTP router");
    mcp_handle.abort();
    serve_result
}

/// `http` transport: the RPC tool surface is mounted as plain JSON POST
/// endpoints (`/rpc/{tool}`) on the same router as the embed/oEmbed
/// surface, since the enabled `rmcp` feature set covers `stdio`/`sse`
/// wire formats but not a streamable-HTTP MCP transport.
async fn run_http(state: AppState) -> anyhow::Result<()> {
    let addr = bind_addr(&state.config)?;
    let router = loist_ingest::build_router(state.clone()).merge(
        loist_ingest::rpc::http_transport::routes().with_state(state),
    );
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding HTTP listener")?;
    info!(%addr, "embed/oEmbed + RPC-over-HTTP surface listening");
    axum::serve(listener, router).await.context("serving HTTP router")
}

/// `sse` transport: the RPC tool surface is mounted as `/sse` + `/message`
/// on the same router as the embed/oEmbed surface via `rmcp`'s SSE server
/// transport.
async fn run_sse(state: AppState) -> anyhow::Result<()> {
    use rmcp::transport::sse_server::{SseServer, SseServerConfig};
    use tokio_util::sync::CancellationToken;

    let addr = bind_addr(&state.config)?;
    let cancellation = CancellationToken::new();
    let sse_config = SseServerConfig {
        bind: addr,
        sse_path: "/sse".to_string(),
        post_path: "/message".to_string(),
        ct: cancellation.clone(),
        sse_keep_alive: None,
    };
    let (sse_server, sse_router) = SseServer::new(sse_config);

    let mcp_state = state.clone();
    let _service_ct = sse_server.with_service(move || LoistService::new(mcp_state.clone()));

    let router = loist_ingest::build_router(state).merge(sse_router);
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding HTTP listener")?;
    info!(%addr, "embed/oEmbed + MCP-over-SSE surface listening");

    let result = axum::serve(listener, router).await.context("serving HTTP router");
    cancellation.cancel();
    result
}
