//! Core error types.

use thiserror::Error;

/// Errors raised by the change pipeline and the subscription registry.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store cannot be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Change-notification interest could not be established.
    #[error("registration error: {0}")]
    Registration(String),

    /// A registration is already active for this process.
    #[error("registration {0} is already active")]
    AlreadyRegistered(u64),

    /// Fetching changed rows failed.
    #[error("query error: {0}")]
    Query(String),

    /// A subscription with this name already exists.
    #[error("Subscription with name {0} already exists.")]
    DuplicateName(String),

    /// Subscription request is malformed.
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),

    /// No subscription matches.
    #[error("Subscription not found.")]
    NotFound,

    /// Delivering a payload to one target failed.
    #[error("delivery to {url} failed: {reason}")]
    Delivery { url: String, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] rowcast_proto::Error),
}

impl Error {
    /// Whether this error must stop the process during startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Registration(_) | Error::AlreadyRegistered(_)
        )
    }
}

/// Convenience alias for core results.
pub type Result<T> = std::result::Result<T, Error>;
