//! `audio_tracks` CRUD, conditional state transitions, and full-text search.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use loist_common::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackState {
    Pending,
    Downloading,
    Validating,
    Extracting,
    Uploading,
    Recording,
    Completed,
    Failed,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Track {
    pub id: Uuid,
    pub source_url: Option<String>,
    pub audio_object_path: Option<String>,
    pub thumbnail_object_path: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub duration_seconds: Option<f64>,
    pub channels: Option<i32>,
    pub sample_rate_hz: Option<i32>,
    pub bitrate_kbps: Option<i32>,
    pub bit_depth: Option<i32>,
    pub format: Option<String>,
    pub state: String,
    pub attempts: i32,
    pub ingested_at: DateTime<Utc>,
    pub quarantined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub id: Uuid,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrackUpdate {
    pub audio_object_path: Option<String>,
    pub thumbnail_object_path: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub duration_seconds: Option<f64>,
    pub channels: Option<i32>,
    pub sample_rate_hz: Option<i32>,
    pub bitrate_kbps: Option<i32>,
    pub bit_depth: Option<i32>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub format: Option<String>,
}

/// Insert a fresh PENDING row; fails with `STATE_CONFLICT`-adjacent
/// `CONFLICT` semantics (mapped here to `StateConflict`) on a duplicate id.
pub async fn insert(pool: &PgPool, track: &NewTrack) -> Result<Track> {
    let row = sqlx::query_as::<_, Track>(
        r#"
        INSERT INTO audio_tracks (id, source_url, state, attempts)
        VALUES ($1, $2, 'PENDING', 0)
        RETURNING *
        "#,
    )
    .bind(track.id)
    .bind(&track.source_url)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            Error::terminal(ErrorKind::StateConflict, "duplicate track identifier")
        }
        _ => Error::from(e),
    })?;

    Ok(row)
}

/// Conditional state transition; fails with `StateConflict` if the row is
/// not currently in `from`. Forward-only pipeline transitions (the `any →
/// FAILED` edge goes through [`mark_failed`] instead, since the caller at
/// that point doesn't reliably know the row's current state).
pub async fn update_state(pool: &PgPool, id: Uuid, from: &str, to: &str) -> Result<()> {
    let result = sqlx::query("UPDATE audio_tracks SET state = $1 WHERE id = $2 AND state = $3")
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::terminal(
            ErrorKind::StateConflict,
            format!("track {id} is not in state {from}"),
        ));
    }
    Ok(())
}

/// Force a row to FAILED regardless of its current state and bump its
/// attempt counter. Used when a pipeline error leaves the row's actual
/// state unknown to the caller (it may have advanced partway through the
/// state machine before failing).
pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE audio_tracks SET state = 'FAILED', attempts = attempts + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Apply extracted metadata and move the row straight to COMPLETED in one
/// UPDATE, refreshing the full-text search vector.
pub async fn complete(pool: &PgPool, id: Uuid, update: &TrackUpdate) -> Result<Track> {
    let row = sqlx::query_as::<_, Track>(
        r#"
        UPDATE audio_tracks SET
            audio_object_path = $2,
            thumbnail_object_path = $3,
            artist = $4,
            title = $5,
            album = $6,
            genre = $7,
            year = $8,
            duration_seconds = $9,
            channels = $10,
            sample_rate_hz = $11,
            bitrate_kbps = $12,
            bit_depth = $13,
            format = $14,
            state = 'COMPLETED',
            search_vector = to_tsvector('english', coalesce($4,'') || ' ' || coalesce($5,'') || ' ' || coalesce($6,'') || ' ' || coalesce($7,''))
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&update.audio_object_path)
    .bind(&update.thumbnail_object_path)
    .bind(&update.artist)
    .bind(&update.title)
    .bind(&update.album)
    .bind(&update.genre)
    .bind(update.year)
    .bind(update.duration_seconds)
    .bind(update.channels)
    .bind(update.sample_rate_hz)
    .bind(update.bitrate_kbps)
    .bind(update.bit_depth)
    .bind(&update.format)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::not_found(format!("track {id} not found")))?;

    Ok(row)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Track> {
    sqlx::query_as::<_, Track>("SELECT * FROM audio_tracks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::not_found(format!("track {id} not found")))
}

/// Text-only full-text search over COMPLETED rows, ranked by FTS rank then
/// descending ingestion timestamp, with conjunctive optional filters.
pub async fn search(
    pool: &PgPool,
    query: &str,
    filters: &SearchFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Track>, i64)> {
    let query = query.trim();
    let has_query = !query.is_empty();

    let rows = sqlx::query_as::<_, Track>(
        r#"
        SELECT * FROM audio_tracks
        WHERE state = 'COMPLETED'
          AND ($1 = '' OR search_vector @@ plainto_tsquery('english', $1))
          AND ($2::text IS NULL OR genre = $2)
          AND ($3::int IS NULL OR year = $3)
          AND ($4::text IS NULL OR format = $4)
        ORDER BY
          CASE WHEN $1 = '' THEN 0 ELSE ts_rank(search_vector, plainto_tsquery('english', $1)) END DESC,
          ingested_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(if has_query { query } else { "" })
    .bind(&filters.genre)
    .bind(filters.year)
    .bind(&filters.format)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM audio_tracks
        WHERE state = 'COMPLETED'
          AND ($1 = '' OR search_vector @@ plainto_tsquery('english', $1))
          AND ($2::text IS NULL OR genre = $2)
          AND ($3::int IS NULL OR year = $3)
          AND ($4::text IS NULL OR format = $4)
        "#,
    )
    .bind(if has_query { query } else { "" })
    .bind(&filters.genre)
    .bind(filters.year)
    .bind(&filters.format)
    .fetch_one(pool)
    .await?;

    Ok((rows, total.0))
}

/// FAILED rows older than `older_than` with no pending retry, eligible for
/// quarantine by the orphan sweep.
pub async fn list_quarantinable(pool: &PgPool, older_than: DateTime<Utc>) -> Result<Vec<Track>> {
    let rows = sqlx::query_as::<_, Track>(
        "SELECT * FROM audio_tracks WHERE state = 'FAILED' AND ingested_at < $1 AND quarantined_at IS NULL",
    )
    .bind(older_than)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn mark_quarantined(pool: &PgPool, id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE audio_tracks SET quarantined_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Quarantined rows older than `older_than`, eligible for deletion.
pub async fn list_deletable(pool: &PgPool, older_than: DateTime<Utc>) -> Result<Vec<Track>> {
    let rows = sqlx::query_as::<_, Track>(
        "SELECT * FROM audio_tracks WHERE quarantined_at IS NOT NULL AND quarantined_at < $1",
    )
    .bind(older_than)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM audio_tracks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
