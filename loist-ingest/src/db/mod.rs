//! Metadata store: connection pool bootstrap, migrations, and the
//! `audio_tracks` CRUD/search surface (components F and G).

pub mod migrations;
pub mod tracks;

use std::time::Duration;

use loist_common::Result;
use sqlx::postgres::{PgPoolOptions, PgPool};

use crate::config::DbConfig;

/// Build the bounded Postgres pool and run pending migrations.
///
/// Acquisition blocks up to 5 s before failing, per `spec.md` §5's shared
/// resource budget; idle connections are recycled after 10 minutes.
pub async fn init_pool(config: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .connect(&config.connection_url())
        .await?;

    migrations::run(&pool).await?;

    Ok(pool)
}

/// `/ready`'s database probe: one cheap round-trip, no schema assumptions.
pub async fn health_probe(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
