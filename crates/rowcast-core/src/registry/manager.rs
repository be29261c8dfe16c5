//! Subscription registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::subscription::{generate_token, IdGenerator, Subscription};
use crate::error::{Error, Result};

/// Registry of active subscriptions.
///
/// Entries are keyed by lower-cased name, which makes the uniqueness check
/// and the insert a single atomic step. Readers always receive clones.
pub struct SubscriptionRegistry {
    /// Active subscriptions keyed by lower-cased name.
    subscriptions: DashMap<String, Subscription>,
    /// Id source for new subscriptions.
    ids: IdGenerator,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
            ids: IdGenerator::new(),
        }
    }

    /// Create a subscription.
    ///
    /// Fails with [`Error::DuplicateName`] when an active subscription already
    /// uses `name`, compared case-insensitively.
    pub fn create(&self, name: &str, url: &str, timeout: u32) -> Result<Subscription> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidSubscription("name must not be empty".into()));
        }
        validate_callback_url(url)?;

        match self.subscriptions.entry(name.to_lowercase()) {
            Entry::Occupied(_) => Err(Error::DuplicateName(name.to_string())),
            Entry::Vacant(slot) => {
                let subscription = Subscription {
                    id: self.ids.next(),
                    name: name.to_string(),
                    url: url.to_string(),
                    timeout,
                    session_token: generate_token(),
                };
                slot.insert(subscription.clone());

                info!(
                    subscription_id = subscription.id,
                    name = %subscription.name,
                    url = %subscription.url,
                    "subscription created"
                );
                Ok(subscription)
            }
        }
    }

    /// Find a subscription by id.
    pub fn find_by_id(&self, id: u64) -> Option<Subscription> {
        self.subscriptions
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.value().clone())
    }

    /// Find a subscription by token (case-insensitive).
    pub fn find_by_token(&self, token: &str) -> Option<Subscription> {
        self.subscriptions
            .iter()
            .find(|entry| entry.value().has_token(token))
            .map(|entry| entry.value().clone())
    }

    /// Find a subscription by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<Subscription> {
        self.subscriptions
            .get(&name.trim().to_lowercase())
            .map(|entry| entry.value().clone())
    }

    /// Delete the subscription holding `token`.
    pub fn delete(&self, token: &str) -> Result<Subscription> {
        let key = self
            .subscriptions
            .iter()
            .find(|entry| entry.value().has_token(token))
            .map(|entry| entry.key().clone())
            .ok_or(Error::NotFound)?;

        let (_, removed) = self
            .subscriptions
            .remove_if(&key, |_, sub| sub.has_token(token))
            .ok_or(Error::NotFound)?;

        debug!(
            subscription_id = removed.id,
            name = %removed.name,
            "subscription removed"
        );
        Ok(removed)
    }

    /// Snapshot of all active subscriptions, ordered by id.
    pub fn list_all(&self) -> Vec<Subscription> {
        let mut all: Vec<Subscription> = self
            .subscriptions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|sub| sub.id);
        all
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no subscription is active.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared registry handle.
pub type SharedRegistry = Arc<SubscriptionRegistry>;

fn validate_callback_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::InvalidSubscription(format!("invalid url {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidSubscription(format!(
            "unsupported url scheme: {}",
            other
        ))),
    }
}
