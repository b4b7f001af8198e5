//! Error types for Tollgate.

use thiserror::Error;

/// Main error type for Tollgate operations.
///
/// Exceeding a quota is not an error; it is reported as a
/// [`Decision`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum TollgateError {
    /// A limit string did not match `<quota>/<second|minute|hour>`
    #[error("invalid limit string: {0:?}; expected format: <quota>/<duration>; example: 5/minute")]
    InvalidSpec(String),

    /// Connection, timeout or protocol failure talking to the counter store
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// The stored counter value is not a valid integer
    #[error("counter store data corrupt: {0}")]
    StoreDataCorrupt(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;
