//! Error taxonomy shared by the RPC tool surface and the HTTP embed surface.
//!
//! One enum carries every failure kind named in the specification's error
//! handling design, along with the retriability predicate the ingestion
//! orchestrator uses to decide whether to back off and retry an attempt or
//! fail it outright.

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A failure kind, independent of transport (RPC or HTTP).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[error("fetch forbidden")]
    FetchForbidden,
    #[error("fetch failed")]
    FetchFailed,
    #[error("size exceeded")]
    SizeExceeded,
    #[error("timeout")]
    Timeout,
    #[error("format invalid")]
    FormatInvalid,
    #[error("metadata extraction failed")]
    MetadataExtractionFailed,
    #[error("storage error")]
    StorageError,
    #[error("database error")]
    DatabaseError,
    #[error("state conflict")]
    StateConflict,
    #[error("resource not found")]
    ResourceNotFound,
    #[error("validation error")]
    ValidationError,
    #[error("invalid query")]
    InvalidQuery,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("external service error")]
    ExternalServiceError,
    #[error("internal error")]
    InternalError,
}

impl ErrorKind {
    /// Whether the ingestion orchestrator (`spec.md` §4.H) should retry an
    /// attempt that failed with this kind, vs. failing it immediately.
    ///
    /// `FetchFailed`/`StorageError`/`DatabaseError` are only retriable for
    /// their transient sub-classes (upstream 5xx, object-store 5xx,
    /// transient DB errors); callers that can distinguish should prefer
    /// [`Error::retriable`] which carries that distinction, this predicate
    /// is the conservative "kind could ever be retriable" check.
    pub fn retriable_kind(self) -> bool {
        matches!(
            self,
            ErrorKind::FetchFailed
                | ErrorKind::Timeout
                | ErrorKind::StorageError
                | ErrorKind::DatabaseError
        )
    }

    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::FetchForbidden => 403,
            ErrorKind::FetchFailed => 502,
            ErrorKind::SizeExceeded => 413,
            ErrorKind::Timeout => 504,
            ErrorKind::FormatInvalid => 422,
            ErrorKind::MetadataExtractionFailed => 422,
            ErrorKind::StorageError => 502,
            ErrorKind::DatabaseError => 500,
            ErrorKind::StateConflict => 409,
            ErrorKind::ResourceNotFound => 404,
            ErrorKind::ValidationError => 400,
            ErrorKind::InvalidQuery => 400,
            ErrorKind::AuthenticationFailed => 401,
            ErrorKind::RateLimitExceeded => 429,
            ErrorKind::ExternalServiceError => 502,
            ErrorKind::InternalError => 500,
        }
    }
}

/// A failure, carrying enough context to build the `{success:false, ...}`
/// envelope (`spec.md` §6) without leaking upstream secrets.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    /// Marks this specific occurrence as retriable, e.g. a `FetchFailed`
    /// carrying a 503 is retriable, one carrying a 404 is not, even though
    /// both share `ErrorKind::FetchFailed`.
    pub retriable: bool,
    pub details: Option<serde_json::Value>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retriable = kind.retriable_kind();
        Self {
            kind,
            message: message.into(),
            retriable,
            details: None,
        }
    }

    pub fn retriable(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retriable: true,
            details: None,
        }
    }

    pub fn terminal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retriable: false,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::terminal(ErrorKind::ResourceNotFound, what)
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::terminal(ErrorKind::InvalidQuery, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::terminal(ErrorKind::InternalError, message)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // Connection-level and pool-timeout errors are transient; everything
        // else (constraint violations, row-not-found) is not.
        let retriable = matches!(
            err,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
        );
        Self {
            kind: ErrorKind::DatabaseError,
            message: err.to_string(),
            retriable,
            details: None,
        }
    }
}

/// The `{success:false, error, message, details}` envelope of `spec.md` §6,
/// transport-agnostic so both the RPC tool surface and the HTTP surface
/// serialize it identically.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for ErrorEnvelope {
    fn from(err: &Error) -> Self {
        Self {
            success: false,
            error: err.kind,
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}
