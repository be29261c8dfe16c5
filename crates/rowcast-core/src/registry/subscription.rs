//! Subscription records, id and token generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rowcast_proto::{SubscriptionDetails, SubscriptionInfo};

/// An active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Unique, time-derived id.
    pub id: u64,
    /// Unique (case-insensitive) subscriber name.
    pub name: String,
    /// Callback URL receiving change records.
    pub url: String,
    /// Delivery timeout in seconds; 0 disables it.
    pub timeout: u32,
    /// Bearer token authorizing deletion.
    pub session_token: String,
}

impl Subscription {
    /// Timeout applied to each delivery, if any.
    pub fn delivery_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(u64::from(self.timeout)))
    }

    /// Whether `token` authorizes this subscription.
    pub fn has_token(&self, token: &str) -> bool {
        self.session_token.eq_ignore_ascii_case(token)
    }

    /// Whether the subscription is called `name`.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Public view without URL and token.
    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Full view returned to the creator.
    pub fn details(&self) -> SubscriptionDetails {
        SubscriptionDetails {
            id: self.id,
            name: self.name.clone(),
            url: self.url.clone(),
            timeout: self.timeout,
            session_token: self.session_token.clone(),
        }
    }
}

/// Strictly increasing ids derived from wall-clock milliseconds.
///
/// Each id is the current time in milliseconds, advanced past the last
/// issued id when the clock has not moved (or moved backwards).
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    /// Create a generator that has issued nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id.
    pub fn next(&self) -> u64 {
        self.next_at(now_millis())
    }

    /// Issue the next id for a given clock reading.
    pub fn next_at(&self, now: u64) -> u64 {
        let mut issued = now;
        // fetch_update only fails when the closure returns None
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                issued = now.max(last + 1);
                Some(issued)
            });
        issued
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate a session token: 128 random bits as 32 hex characters.
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
