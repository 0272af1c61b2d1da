//! Connection pool monitoring (component G).
//!
//! Instrumented acquisition/release timing, generalized from the teacher's
//! SQLite version to the Postgres pool the metadata store now uses.

use sqlx::{Postgres, Transaction};
use std::time::Instant;
use loist_common::Result;

pub struct MonitoredTransaction<'c> {
    tx: Option<Transaction<'c, Postgres>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    fn new(tx: Transaction<'c, Postgres>, caller: &'static str, acquired_at: Instant) -> Self {
        Self {
            tx: Some(tx),
            caller,
            acquired_at,
        }
    }

    pub async fn commit(mut self) -> Result<()> {
        let elapsed = self.acquired_at.elapsed();
        let tx = self.tx.take().expect("transaction already consumed");
        tx.commit().await?;
        log_release(self.caller, elapsed.as_millis(), "commit");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        let elapsed = self.acquired_at.elapsed();
        let tx = self.tx.take().expect("transaction already consumed");
        tx.rollback().await?;
        log_release(self.caller, elapsed.as_millis(), "rollback");
        Ok(())
    }

    pub fn inner_mut(&mut self) -> &mut Transaction<'c, Postgres> {
        self.tx.as_mut().expect("transaction already consumed")
    }
}

fn log_release(caller: &'static str, held_ms: u128, via: &'static str) {
    if held_ms > 2000 {
        tracing::warn!(caller, held_ms, via, "long transaction - connection held for extended period");
    } else if held_ms > 1000 {
        tracing::info!(caller, held_ms, via, "transaction held longer than expected (>1s)");
    } else {
        tracing::debug!(caller, held_ms, via, "connection released");
    }
}

impl<'c> Drop for MonitoredTransaction<'c> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            let held_ms = self.acquired_at.elapsed().as_millis();
            if held_ms > 2000 {
                tracing::warn!(caller = self.caller, held_ms, "long transaction dropped without commit/rollback");
            } else {
                tracing::debug!(caller = self.caller, held_ms, "connection released (drop)");
            }
        }
    }
}

/// Begin a monitored transaction, logging acquisition wait and release hold
/// times so pool saturation shows up in logs before it shows up as errors.
pub async fn begin_monitored<'c>(
    pool: &'c sqlx::PgPool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    tracing::debug!(caller, "connection acquisition requested");

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > 1000 {
        tracing::warn!(caller, wait_ms, "slow connection acquisition - pool may be saturated");
    } else if wait_ms > 500 {
        tracing::info!(caller, wait_ms, "connection acquisition slower than expected (>500ms)");
    } else {
        tracing::debug!(caller, wait_ms, "connection acquired");
    }

    Ok(MonitoredTransaction::new(tx, caller, Instant::now()))
}

/// Read-only snapshot of pool statistics (`spec.md` §4.G).
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

pub fn pool_stats(pool: &sqlx::PgPool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
    }
}
