//! The three tools of `spec.md` §4.I, dispatched manually rather than via
//! `rmcp`'s derive macros so the bearer-token check and UUID/limit
//! validation stay in one visible place per tool.

use rmcp::handler::server::tool::cached_schema_for_type;
use rmcp::model::{CallToolResult, Content, Tool};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use loist_common::{uuid_utils, Error, ErrorKind};

use crate::orchestrator::{ProcessOptions, Source};
use crate::AppState;

fn tool_error(err: &Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(
        json!({ "success": false, "error": err.kind, "message": err.message }).to_string(),
    )])
}

fn tool_ok(value: serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(value.to_string())])
}

#[derive(Debug, Serialize)]
struct HealthCheckResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    transport: String,
}

pub struct HealthCheckTool;

impl HealthCheckTool {
    pub const NAME: &'static str = "health_check";

    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some("Report service liveness, name, version, and active transport.".into()),
            input_schema: cached_schema_for_type::<EmptyParams>(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    pub fn call(state: &AppState) -> CallToolResult {
        tool_ok(json!(HealthCheckResponse {
            status: "ok",
            service: "loist-ingest",
            version: env!("CARGO_PKG_VERSION"),
            transport: format!("{:?}", state.config.transport),
        }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProcessAudioCompleteParams {
    pub source: Source,
    #[serde(default)]
    pub options: Option<ProcessOptions>,
}

pub struct ProcessAudioCompleteTool;

impl ProcessAudioCompleteTool {
    pub const NAME: &'static str = "process_audio_complete";

    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(
                "Download an audio file from a source URL, validate and extract its metadata, \
                 upload it to object storage, and record it in the library."
                    .into(),
            ),
            input_schema: cached_schema_for_type::<ProcessAudioCompleteParams>(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    pub async fn call(state: &AppState, params: ProcessAudioCompleteParams) -> CallToolResult {
        let options = params.options.unwrap_or_default();
        match state.orchestrator.process(params.source, options).await {
            Ok(result) => tool_ok(json!({
                "success": true,
                "audioId": result.track_id,
                "metadata": {
                    "Product": {
                        "Artist": result.metadata.artist,
                        "Title": result.metadata.title,
                        "Album": result.metadata.album,
                        "MBID": serde_json::Value::Null,
                        "Genre": result.metadata.genre.map(|g| vec![g]).unwrap_or_default(),
                        "Year": result.metadata.year,
                    },
                    "Format": {
                        "Duration": result.metadata.duration_seconds,
                        "Channels": result.metadata.channels,
                        "Sample rate": result.metadata.sample_rate_hz,
                        "Bitrate": result.metadata.bitrate_kbps,
                        "Format": result.format,
                    },
                    "urlEmbedLink": format!("{}/embed/{}", state.config.embed_base_url, result.track_id),
                },
                "resources": {
                    "audio": result.audio_url,
                    "thumbnail": result.thumbnail_url,
                    "waveform": serde_json::Value::Null,
                },
                "processingTime": result.processing_time_ms,
            })),
            Err(err) => tool_error(&err),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetAudioMetadataParams {
    #[serde(rename = "audioId")]
    pub audio_id: String,
}

pub struct GetAudioMetadataTool;

impl GetAudioMetadataTool {
    pub const NAME: &'static str = "get_audio_metadata";

    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some("Look up a previously ingested track's metadata by id.".into()),
            input_schema: cached_schema_for_type::<GetAudioMetadataParams>(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    pub async fn call(state: &AppState, params: GetAudioMetadataParams) -> CallToolResult {
        let id = match uuid_utils::parse_canonical(&params.audio_id) {
            Some(id) => id,
            None => {
                return tool_error(&Error::terminal(ErrorKind::InvalidQuery, "audioId is not a canonical UUID"))
            }
        };

        match state.orchestrator.get_metadata(id).await {
            Ok(track) => tool_ok(json!({ "success": true, "track": track_json(&track) })),
            Err(err) => tool_error(&err),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchLibraryParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Option<SearchFiltersParam>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchFiltersParam {
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub format: Option<String>,
}

pub struct SearchLibraryTool;

impl SearchLibraryTool {
    pub const NAME: &'static str = "search_library";

    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some("Full-text search over completed tracks in the library.".into()),
            input_schema: cached_schema_for_type::<SearchLibraryParams>(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    pub async fn call(state: &AppState, params: SearchLibraryParams) -> CallToolResult {
        let limit = params.limit.unwrap_or(20).clamp(1, 100);
        let offset = params.offset.unwrap_or(0).max(0);
        let filters = crate::db::tracks::SearchFilters {
            genre: params.filters.as_ref().and_then(|f| f.genre.clone()),
            year: params.filters.as_ref().and_then(|f| f.year),
            format: params.filters.as_ref().and_then(|f| f.format.clone()),
        };

        match state.orchestrator.search(&params.query, &filters, limit, offset).await {
            Ok((rows, total)) => tool_ok(json!({
                "success": true,
                "results": rows.iter().map(track_json).collect::<Vec<_>>(),
                "total": total,
            })),
            Err(err) => tool_error(&err),
        }
    }
}

fn track_json(track: &crate::db::tracks::Track) -> serde_json::Value {
    json!({
        "id": track.id,
        "artist": track.artist,
        "title": track.title,
        "album": track.album,
        "genre": track.genre,
        "year": track.year,
        "durationSeconds": track.duration_seconds,
        "channels": track.channels,
        "sampleRateHz": track.sample_rate_hz,
        "bitrateKbps": track.bitrate_kbps,
        "bitDepth": track.bit_depth,
        "format": track.format,
        "state": track.state,
    })
}

pub fn all_tools() -> Vec<Tool> {
    vec![
        HealthCheckTool::to_tool(),
        ProcessAudioCompleteTool::to_tool(),
        GetAudioMetadataTool::to_tool(),
        SearchLibraryTool::to_tool(),
    ]
}

/// Bearer-token check, applied uniformly before dispatch; tokens are never
/// logged regardless of outcome.
pub fn check_bearer_token(state: &AppState, presented: Option<&str>) -> Result<(), Error> {
    if !state.config.auth_enabled {
        return Ok(());
    }
    let expected = state.config.bearer_token.as_deref().unwrap_or_default();
    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(Error::terminal(ErrorKind::AuthenticationFailed, "missing or mismatched bearer token")),
    }
}

pub struct LoistTools;
