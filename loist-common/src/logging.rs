//! Tracing initialization shared by the binary and its integration tests.
//!
//! `spec.md` §6 names `LOG_LEVEL`/`LOG_FORMAT` as configuration keys; this
//! is the one place that turns them into a global subscriber, the way the
//! teacher's `main.rs` builds a `FmtSubscriber` once at startup.

use tracing_subscriber::{fmt, EnvFilter};

/// Text vs. JSON log output, selected by the `LOG_FORMAT` env var.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Install the global tracing subscriber. Safe to call once per process;
/// a second call is a no-op (errors are swallowed, matching the teacher's
/// tolerance for re-initialization in tests).
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Text => subscriber.try_init(),
    };
    if let Err(err) = result {
        tracing::debug!("tracing subscriber already initialized: {err}");
    }
}
