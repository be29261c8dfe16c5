//! In-memory registry of HTTP subscribers.
//!
//! Subscriptions live only for the lifetime of the process. The registry is
//! constructed once at startup and shared through an `Arc` between the
//! dispatcher and the HTTP layer.

mod manager;
mod subscription;

pub use manager::{SharedRegistry, SubscriptionRegistry};
pub use subscription::{generate_token, IdGenerator, Subscription};
