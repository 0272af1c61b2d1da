//! Embed / oEmbed HTTP surface (component J) plus `/health` and `/ready`.

pub mod embed;
pub mod health;
pub mod oembed;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use crate::AppState;

/// The bearer token presented on a request, threaded into the RPC
/// dispatcher's context via request extensions so both transports share
/// one auth check (`rpc::tools::check_bearer_token`).
#[derive(Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match header {
            Some(token) => Ok(BearerToken(token.to_string())),
            None => Err((StatusCode::UNAUTHORIZED, "missing bearer token")),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/embed/:id", get(embed::get_embed))
        .route("/oembed", get(oembed::get_oembed))
        .route("/.well-known/oembed.json", get(oembed::get_discovery_document))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
}
