//! Ingestion orchestrator (component H): the state-machine pipeline that
//! wires the signature validator, metadata extractor, object-store gateway,
//! and metadata store together, with retry/backoff and orphan reclamation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use loist_common::{Error, ErrorKind, Result};

use crate::db::tracks::{self, NewTrack, SearchFilters, Track, TrackUpdate};
use crate::metadata;
use crate::signature;
use crate::storage::{ObjectStoreGateway, SignMethod};
use crate::{cache::SignedUrlCache, fetch};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const QUARANTINE_AFTER: chrono::Duration = chrono::Duration::hours(1);
const DELETE_AFTER: chrono::Duration = chrono::Duration::days(7);

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    HttpUrl {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        filename: Option<String>,
        #[serde(default)]
        #[allow(dead_code)]
        mime_type: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProcessOptions {
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
}

fn default_max_size_mb() -> u32 {
    100
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self { max_size_mb: default_max_size_mb() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub track_id: Uuid,
    pub metadata: metadata::TrackMetadata,
    pub format: &'static str,
    pub audio_url: String,
    pub thumbnail_url: Option<String>,
    pub processing_time_ms: f64,
}

/// The services the orchestrator wires together. Passed in, never the
/// reverse, so the orchestrator owns no cyclic references back to its
/// callers.
pub struct Orchestrator {
    pub pool: sqlx::PgPool,
    pub storage: Arc<ObjectStoreGateway>,
    pub cache: Arc<SignedUrlCache>,
    pub signed_url_ttl: Duration,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<Result<ProcessResult>>>>>,
    reclaim_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        pool: sqlx::PgPool,
        storage: Arc<ObjectStoreGateway>,
        cache: Arc<SignedUrlCache>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            storage,
            cache,
            signed_url_ttl,
            in_flight: Mutex::new(HashMap::new()),
            reclaim_lock: Mutex::new(()),
        }
    }

    /// The single-flight slot for `key`, creating one if none is in flight.
    async fn cell_for(&self, key: &str) -> Arc<OnceCell<Result<ProcessResult>>> {
        let mut guard = self.in_flight.lock().await;
        guard.entry(key.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
    }

    /// Drops `key`'s slot once its result has landed, so a request made
    /// after this one completes starts a fresh ingestion rather than
    /// replaying a stale result (`spec.md` §8 dedupes only "within the
    /// single-flight window"). Guarded by pointer identity: if a
    /// concurrent `process()` already replaced this slot with a new one
    /// (because it ran after we removed it and before this check), we
    /// leave that one alone.
    async fn release(&self, key: &str, cell: &Arc<OnceCell<Result<ProcessResult>>>) {
        let mut guard = self.in_flight.lock().await;
        if let Some(current) = guard.get(key) {
            if Arc::ptr_eq(current, cell) {
                guard.remove(key);
            }
        }
    }

    /// At-most-one concurrent attempt per source URL: every caller racing
    /// on the same URL shares the first attempt's `ProcessResult` (or
    /// error) instead of re-running the pipeline (`spec.md` §4.H "single
    /// awaiter set", §8 round-trip law).
    pub async fn process(&self, source: Source, options: ProcessOptions) -> Result<ProcessResult> {
        let Source::HttpUrl { url, headers, filename, .. } = source;
        let max_size_bytes = options.max_size_mb as u64 * 1024 * 1024;

        let cell = self.cell_for(&url).await;
        let result = cell
            .get_or_init(|| async {
                let start = std::time::Instant::now();
                let mut attempt = 0u32;
                loop {
                    attempt += 1;
                    match self.attempt_once(&url, &headers, filename.as_deref(), max_size_bytes).await {
                        Ok(mut result) => {
                            result.processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
                            break Ok(result);
                        }
                        Err(err) if err.retriable && attempt < MAX_ATTEMPTS => {
                            let delay = backoff_delay(attempt);
                            tracing::warn!(attempt, url, error = %err, delay_ms = delay.as_millis() as u64, "ingestion attempt failed, retrying");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        Err(err) => break Err(err),
                    }
                }
            })
            .await
            .clone();

        self.release(&url, &cell).await;
        result
    }

    /// Creates the fresh per-attempt track row, runs the pipeline, and
    /// marks the row FAILED on any error so it becomes visible to
    /// `get_audio_metadata` and eligible for the orphan sweep (`spec.md`
    /// §4.H "any → FAILED") instead of being left stuck mid-pipeline.
    async fn attempt_once(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        filename: Option<&str>,
        max_size_bytes: u64,
    ) -> Result<ProcessResult> {
        let track_id = Uuid::new_v4();
        tracks::insert(&self.pool, &NewTrack { id: track_id, source_url: Some(url.to_string()) }).await?;

        match self.run_pipeline(track_id, url, headers, filename, max_size_bytes).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if let Err(mark_err) = tracks::mark_failed(&self.pool, track_id).await {
                    tracing::warn!(track_id = %track_id, error = %mark_err, "failed to mark track FAILED after pipeline error");
                }
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        track_id: Uuid,
        url: &str,
        headers: &HashMap<String, String>,
        filename: Option<&str>,
        max_size_bytes: u64,
    ) -> Result<ProcessResult> {
        tracks::update_state(&self.pool, track_id, "PENDING", "DOWNLOADING").await?;

        let fetched = fetch::fetch(url, headers, max_size_bytes).await?;

        tracks::update_state(&self.pool, track_id, "DOWNLOADING", "VALIDATING").await?;

        let head = tokio::fs::read(&fetched.path).await.map(|b| b[..b.len().min(16)].to_vec()).unwrap_or_default();
        let claimed_ext = filename.and_then(|f| Path::new(f).extension()).and_then(|e| e.to_str());
        let format = signature::classify(&head, claimed_ext)?;

        tracks::update_state(&self.pool, track_id, "VALIDATING", "EXTRACTING").await?;

        let stem = filename
            .map(|f| Path::new(f).file_stem().and_then(|s| s.to_str()).unwrap_or(f).to_string())
            .unwrap_or_else(|| track_id.to_string());
        let extracted = metadata::extract(&fetched.path, format, &stem)?;

        tracks::update_state(&self.pool, track_id, "EXTRACTING", "UPLOADING").await?;

        let ext = extension_for(format);
        let audio_key = format!("audio/{track_id}/{track_id}.{ext}");
        self.storage.upload(&fetched.path, &audio_key, content_type_for(format)).await?;

        let mut thumbnail_key = None;
        if let Some(artwork) = &extracted.artwork {
            let thumb_ext = if artwork.kind.content_type() == "image/png" { "png" } else { "jpg" };
            let key = format!("audio/{track_id}/thumbnail.{thumb_ext}");
            let tmp = std::env::temp_dir().join(format!("loist-thumb-{track_id}.tmp"));
            tokio::fs::write(&tmp, &artwork.bytes).await.map_err(|e| Error::internal(format!("failed to stage thumbnail: {e}")))?;
            let upload_result = self.storage.upload(&tmp, &key, artwork.kind.content_type()).await;
            let _ = tokio::fs::remove_file(&tmp).await;
            upload_result?;
            thumbnail_key = Some(key);
        }

        tracks::update_state(&self.pool, track_id, "UPLOADING", "RECORDING").await?;

        let update = TrackUpdate {
            audio_object_path: Some(audio_key.clone()),
            thumbnail_object_path: thumbnail_key.clone(),
            artist: extracted.metadata.artist.clone(),
            title: extracted.metadata.title.clone(),
            album: extracted.metadata.album.clone(),
            genre: extracted.metadata.genre.clone(),
            year: extracted.metadata.year,
            duration_seconds: Some(extracted.metadata.duration_seconds),
            channels: Some(extracted.metadata.channels as i32),
            sample_rate_hz: Some(extracted.metadata.sample_rate_hz as i32),
            bitrate_kbps: Some(extracted.metadata.bitrate_kbps as i32),
            bit_depth: extracted.metadata.bit_depth.map(|b| b as i32),
            format: Some(format.as_str().to_string()),
        };
        tracks::complete(&self.pool, track_id, &update).await?;

        let audio_url = self.sign(&audio_key, SignMethod::Get).await?;
        let thumbnail_url = match &thumbnail_key {
            Some(key) => Some(self.sign(key, SignMethod::Get).await?),
            None => None,
        };

        Ok(ProcessResult {
            track_id,
            metadata: extracted.metadata,
            format: format.as_str(),
            audio_url,
            thumbnail_url,
            processing_time_ms: 0.0,
        })
    }

    /// Single-flighted signed-URL retrieval, fronted by the cache.
    pub async fn sign(&self, key: &str, method: SignMethod) -> Result<String> {
        let bucket = self.storage.bucket();
        if let Some(cached) = self.cache.get(bucket, key) {
            return Ok(cached);
        }
        let (url, expires_at) = self.storage.sign(key, self.signed_url_ttl, method, None, None).await?;
        self.cache.insert(bucket, key, url.clone(), expires_at);
        Ok(url)
    }

    pub async fn get_metadata(&self, id: Uuid) -> Result<Track> {
        tracks::get(&self.pool, id).await
    }

    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Track>, i64)> {
        tracks::search(&self.pool, query, filters, limit.clamp(1, 100), offset.max(0)).await
    }

    /// Orphan sweep: quarantine stale FAILED rows, then delete blobs and
    /// rows quarantined long enough to have been audited. Single-flighted
    /// via its own lock, separate from the per-URL ingestion dedup above.
    pub async fn reclaim(&self) -> Result<()> {
        let _guard = self.reclaim_lock.lock().await;

        let now = Utc::now();

        for track in tracks::list_quarantinable(&self.pool, now - QUARANTINE_AFTER).await? {
            for path in [&track.audio_object_path, &track.thumbnail_object_path].into_iter().flatten() {
                let quarantine_key = quarantine_key_for(path);
                if let Err(e) = self.storage.copy(path, &quarantine_key).await {
                    tracing::warn!(track_id = %track.id, path, error = %e, "failed to copy blob to quarantine prefix");
                    continue;
                }
                if let Err(e) = self.storage.delete(path).await {
                    tracing::warn!(track_id = %track.id, path, error = %e, "failed to delete original blob after quarantine copy");
                }
            }
            tracks::mark_quarantined(&self.pool, track.id, now).await?;
        }

        for track in tracks::list_deletable(&self.pool, now - DELETE_AFTER).await? {
            for path in [&track.audio_object_path, &track.thumbnail_object_path].into_iter().flatten() {
                let quarantine_key = quarantine_key_for(path);
                if let Err(e) = self.storage.delete(&quarantine_key).await {
                    tracing::warn!(track_id = %track.id, path = %quarantine_key, error = %e, "failed to delete quarantined blob");
                }
            }
            tracks::delete(&self.pool, track.id).await?;
        }

        Ok(())
    }
}

/// `gs://{bucket}/audio/{uuid}/...` -> `gs://{bucket}/quarantine/{uuid}/...`,
/// the object-key rewrite the orphan sweep's quarantine/delete passes both
/// rely on (`spec.md` §6 "Object-store layout").
fn quarantine_key_for(audio_key: &str) -> String {
    audio_key.replacen("audio/", "quarantine/", 1)
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE.as_millis() as u64 * 2u64.saturating_pow(attempt);
    let capped = base.min(BACKOFF_CAP.as_millis() as u64);
    let jitter = rand::thread_rng().gen_range(0..=capped);
    Duration::from_millis(jitter)
}

fn extension_for(format: signature::AudioFormat) -> &'static str {
    use signature::AudioFormat::*;
    match format {
        Mp3 => "mp3",
        Flac => "flac",
        M4a => "m4a",
        Aac => "aac",
        Ogg => "ogg",
        Wav => "wav",
    }
}

fn content_type_for(format: signature::AudioFormat) -> &'static str {
    use signature::AudioFormat::*;
    match format {
        Mp3 => "audio/mpeg",
        Flac => "audio/flac",
        M4a | Aac => "audio/mp4",
        Ogg => "audio/ogg",
        Wav => "audio/wav",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped_and_non_negative() {
        for attempt in 1..10 {
            let delay = backoff_delay(attempt);
            assert!(delay <= BACKOFF_CAP);
        }
    }

    #[test]
    fn quarantine_key_rewrites_only_the_first_audio_segment() {
        assert_eq!(
            quarantine_key_for("audio/abc/abc.mp3"),
            "quarantine/abc/abc.mp3"
        );
        assert_eq!(
            quarantine_key_for("audio/abc/thumbnail.jpg"),
            "quarantine/abc/thumbnail.jpg"
        );
    }
}
