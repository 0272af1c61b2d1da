//! `GET /oembed` and `GET /.well-known/oembed.json`: the oEmbed discovery
//! surface consumed by Notion/Slack/Discord/Twitter link unfurlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use loist_common::{uuid_utils, Error, ErrorKind};

use crate::storage::SignMethod;
use crate::AppState;

const DEFAULT_WIDTH: u32 = 500;
const DEFAULT_HEIGHT: u32 = 200;
const CACHE_AGE: u32 = 3600;

#[derive(Debug, Deserialize)]
pub struct OEmbedQuery {
    pub url: Option<String>,
    pub maxwidth: Option<u32>,
    pub maxheight: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OEmbedResponse {
    pub version: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub provider_name: &'static str,
    pub provider_url: String,
    pub title: String,
    pub author_name: Option<String>,
    pub html: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<u32>,
    pub cache_age: u32,
}

/// Extracts the track id from a URL that must match
/// `{embed-base}/embed/{uuid}` exactly.
fn extract_track_id(embed_base_url: &str, url: &str) -> Option<uuid::Uuid> {
    let prefix = format!("{}/embed/", embed_base_url.trim_end_matches('/'));
    let id = url.strip_prefix(&prefix)?;
    uuid_utils::parse_canonical(id)
}

pub async fn get_oembed(State(state): State<AppState>, Query(query): Query<OEmbedQuery>) -> Response {
    let url = match query.url {
        Some(url) if !url.is_empty() => url,
        _ => return error_response(Error::terminal(ErrorKind::ValidationError, "missing 'url' query parameter")),
    };

    let track_id = match extract_track_id(&state.config.embed_base_url, &url) {
        Some(id) => id,
        None => {
            return error_response(Error::terminal(
                ErrorKind::ValidationError,
                "url does not match {embed-base}/embed/{uuid}",
            ))
        }
    };

    let track = match state.orchestrator.get_metadata(track_id).await {
        Ok(t) => t,
        Err(err) => return error_response(err),
    };

    let width = query.maxwidth.map(|m| m.min(DEFAULT_WIDTH)).unwrap_or(DEFAULT_WIDTH);
    let height = query.maxheight.map(|m| m.min(DEFAULT_HEIGHT)).unwrap_or(DEFAULT_HEIGHT);

    let embed_url = format!("{}/embed/{}", state.config.embed_base_url, track_id);
    let title = track.title.clone().unwrap_or_else(|| "Untitled".to_string());

    let thumbnail_url = match &track.thumbnail_object_path {
        Some(path) => state.orchestrator.sign(path, SignMethod::Get).await.ok(),
        None => None,
    };

    let html = format!(
        "<iframe src='{embed_url}' width='{width}' height='{height}' frameborder='0' allow='autoplay' allowfullscreen></iframe>",
    );

    let response = OEmbedResponse {
        version: "1.0",
        kind: "rich",
        provider_name: "loist",
        provider_url: state.config.embed_base_url.clone(),
        title,
        author_name: track.artist.clone(),
        html,
        width,
        height,
        thumbnail_width: thumbnail_url.as_ref().map(|_| width),
        thumbnail_height: thumbnail_url.as_ref().map(|_| height),
        thumbnail_url,
        cache_age: CACHE_AGE,
    };

    Json(response).into_response()
}

#[derive(Debug, Serialize)]
pub struct ProviderDiscovery {
    pub provider_name: &'static str,
    pub provider_url: String,
    pub endpoints: Vec<ProviderEndpoint>,
}

#[derive(Debug, Serialize)]
pub struct ProviderEndpoint {
    pub schemes: Vec<String>,
    pub url: String,
    pub discovery: bool,
}

/// `GET /.well-known/oembed.json`: provider discovery document.
pub async fn get_discovery_document(State(state): State<AppState>) -> Json<ProviderDiscovery> {
    let base = state.config.embed_base_url.clone();
    Json(ProviderDiscovery {
        provider_name: "loist",
        provider_url: base.clone(),
        endpoints: vec![ProviderEndpoint {
            schemes: vec![format!("{base}/embed/*")],
            url: format!("{base}/oembed"),
            discovery: true,
        }],
    })
}

fn error_response(err: Error) -> Response {
    let status = StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(loist_common::ErrorEnvelope::from(&err))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_matching_url() {
        let id = extract_track_id("https://loist.io", "https://loist.io/embed/550e8400-e29b-41d4-a716-446655440000");
        assert!(id.is_some());
    }

    #[test]
    fn rejects_wrong_host() {
        assert!(extract_track_id("https://loist.io", "https://example.com/invalid/test").is_none());
    }

    #[test]
    fn rejects_non_uuid_segment() {
        assert!(extract_track_id("https://loist.io", "https://loist.io/embed/not-a-uuid").is_none());
    }
}
