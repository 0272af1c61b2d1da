//! `GET /embed/{id}`: renders the embeddable HTML5 player with Open Graph,
//! Twitter Card, and oEmbed discovery meta tags.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use loist_common::{Error, ErrorKind};

use crate::storage::SignMethod;
use crate::AppState;

pub async fn get_embed(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let track_id = match loist_common::uuid_utils::parse_canonical(&id) {
        Some(id) => id,
        None => return error_response(Error::terminal(ErrorKind::InvalidQuery, "id is not a canonical UUID")),
    };

    let track = match state.orchestrator.get_metadata(track_id).await {
        Ok(t) => t,
        Err(err) => return error_response(err),
    };

    let audio_url = match &track.audio_object_path {
        Some(path) => match state.orchestrator.sign(path, SignMethod::Get).await {
            Ok(url) => url,
            Err(err) => return error_response(err),
        },
        None => return error_response(Error::not_found("track has no stored audio")),
    };

    let thumbnail_url = match &track.thumbnail_object_path {
        Some(path) => state.orchestrator.sign(path, SignMethod::Get).await.ok(),
        None => None,
    };

    let title = escape_html(&track.title.clone().unwrap_or_else(|| "Untitled".to_string()));
    let embed_url = format!("{}/embed/{}", state.config.embed_base_url, track_id);
    let audio_content_type = content_type_for(track.format.as_deref());

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<meta property="og:type" content="music.song">
<meta property="og:title" content="{title}">
<meta property="og:audio" content="{audio_url}">
<meta property="og:audio:type" content="{audio_content_type}">
<meta property="og:image" content="{thumbnail}">
<meta property="og:url" content="{embed_url}">
<meta property="og:site_name" content="loist">
<meta name="twitter:card" content="player">
<meta name="twitter:player" content="{embed_url}">
<meta name="twitter:player:width" content="500">
<meta name="twitter:player:height" content="200">
<meta name="twitter:title" content="{title}">
<meta name="twitter:image" content="{thumbnail}">
<link rel="alternate" type="application/json+oembed" href="{oembed_base}/oembed?url={embed_url}" title="{title}">
</head>
<body>
<audio controls src="{audio_url}" style="width:500px"></audio>
</body>
</html>"#,
        thumbnail = thumbnail_url.unwrap_or_default(),
        oembed_base = state.config.embed_base_url,
    );

    Html(html).into_response()
}

/// Minimal HTML-entity escaping for track metadata interpolated into the
/// player template; titles/artists come from untrusted embedded tags.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn content_type_for(format: Option<&str>) -> &'static str {
    match format {
        Some("MP3") => "audio/mpeg",
        Some("FLAC") => "audio/flac",
        Some("OGG") => "audio/ogg",
        Some("WAV") => "audio/wav",
        Some("M4A") | Some("AAC") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

fn error_response(err: Error) -> Response {
    let status = StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Html(format!("<p>{}</p>", err.message))).into_response()
}
