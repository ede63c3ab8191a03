//! Error types and result alias for the dispatch middleware.
//!
//! Follows the same canonical-struct-or-string-field shape the rest of the
//! `airsstack-airssys` workspace uses for its error enums: one variant per
//! taxonomy entry, `thiserror` for `Display`, and small helper methods for
//! categorization instead of `matches!` scattered through call sites.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the dispatch middleware (see spec §7).
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// `execute()` (or any other public entry point) was called before `initialize()`.
    #[error("middleware not initialized")]
    NotInitialized,

    /// The durable queue already holds `max_queue_size` non-terminal entries.
    #[error("queue is full (max_queue_size={max_queue_size})")]
    QueueFull { max_queue_size: usize },

    /// The SMS codec could not compress the request into 160 characters.
    #[error("encoded SMS payload exceeds 160 characters ({len} > 160)")]
    SmsTooLarge { len: usize },

    /// The SMS transport reports it is missing telephony permissions.
    #[error("SMS permission denied")]
    PermissionDenied,

    /// An HTTP attempt did not complete within its timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The underlying transport returned a non-timeout error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A queued request's `expires_at` has passed.
    #[error("request expired")]
    Expired,

    /// A queued request exhausted its retry budget.
    #[error("max retries exceeded")]
    MaxRetriesExceeded,

    /// The persistent store itself failed (disk full, corruption, etc). Fatal.
    #[error("persistent store error: {0}")]
    Store(String),
}

impl Error {
    /// True for errors the Queue Manager should treat as "try again later"
    /// rather than a terminal state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::TransportError(_))
    }

    /// Stable category string for logging/metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::NotInitialized => "not_initialized",
            Error::QueueFull { .. } => "queue_full",
            Error::SmsTooLarge { .. } => "sms_too_large",
            Error::PermissionDenied => "permission_denied",
            Error::Timeout(_) => "timeout",
            Error::TransportError(_) => "transport_error",
            Error::Expired => "expired",
            Error::MaxRetriesExceeded => "max_retries_exceeded",
            Error::Store(_) => "store",
        }
    }

    /// True if the persistent store itself is the failing component (fatal
    /// per spec §7: "errors from the persistent store ... are fatal for the
    /// enclosing call and surfaced").
    pub fn is_store_fatal(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}
