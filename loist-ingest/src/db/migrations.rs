//! Migration runner and `schema_migrations` bookkeeping.
//!
//! Each migration is a single SQL string applied in its own transaction and
//! recorded with a checksum. Re-applying an unchanged version is a no-op; a
//! changed checksum on an already-applied version is only a warning, never
//! a rewrite (`spec.md` §4.F).

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};

use loist_common::Result;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_schema_migrations",
        sql: r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version     TEXT PRIMARY KEY,
                checksum    TEXT NOT NULL,
                applied_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                duration_ms BIGINT NOT NULL
            )
        "#,
    },
    Migration {
        version: "0002_audio_tracks",
        sql: r#"
            CREATE TABLE IF NOT EXISTS audio_tracks (
                id                UUID PRIMARY KEY,
                source_url        TEXT,
                audio_object_path TEXT,
                thumbnail_object_path TEXT,
                artist            TEXT,
                title             TEXT,
                album             TEXT,
                genre             TEXT,
                year              INTEGER,
                duration_seconds  DOUBLE PRECISION,
                channels          INTEGER,
                sample_rate_hz    INTEGER,
                bitrate_kbps      INTEGER,
                bit_depth         INTEGER,
                format            TEXT,
                state             TEXT NOT NULL,
                attempts          INTEGER NOT NULL DEFAULT 0,
                ingested_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
                quarantined_at    TIMESTAMPTZ,
                search_vector     tsvector
            )
        "#,
    },
    Migration {
        version: "0003_audio_tracks_indexes",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_audio_tracks_state ON audio_tracks (state);
            CREATE INDEX IF NOT EXISTS idx_audio_tracks_ingested_at ON audio_tracks (ingested_at);
            CREATE INDEX IF NOT EXISTS idx_audio_tracks_search_vector ON audio_tracks USING GIN (search_vector);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_audio_tracks_object_path ON audio_tracks (audio_object_path) WHERE audio_object_path IS NOT NULL;
        "#,
    },
];

fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub async fn run(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     TEXT PRIMARY KEY,
            checksum    TEXT NOT NULL,
            applied_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            duration_ms BIGINT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for migration in MIGRATIONS {
        let sum = checksum(migration.sql);

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT checksum FROM schema_migrations WHERE version = $1")
                .bind(migration.version)
                .fetch_optional(pool)
                .await?;

        if let Some((existing_checksum,)) = existing {
            if existing_checksum != sum {
                warn!(
                    version = migration.version,
                    "migration checksum changed since it was applied; not re-applying"
                );
            }
            continue;
        }

        let start = std::time::Instant::now();
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
        sqlx::query(
            "INSERT INTO schema_migrations (version, checksum, duration_ms) VALUES ($1, $2, $3)",
        )
        .bind(migration.version)
        .bind(&sum)
        .bind(start.elapsed().as_millis() as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(version = migration.version, "applied migration");
    }

    Ok(())
}
