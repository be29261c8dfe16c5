//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A row set violates the column/value alignment invariant.
    #[error("invalid row set: {0}")]
    InvalidRowSet(String),

    /// Unknown operation kind.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Unknown escaping mode.
    #[error("unknown escaping mode: {0}")]
    UnknownEscaping(String),

    /// A raw event payload could not be decoded.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, Error>;
