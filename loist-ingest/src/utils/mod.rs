//! Utility modules for loist-ingest

pub mod pool_monitor;

pub use pool_monitor::{begin_monitored, pool_stats, MonitoredTransaction, PoolStats};
