//! Request and response bodies of the subscription API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope for every API response: either a response or an error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    /// Time the result was produced.
    pub created: DateTime<Utc>,
    /// Error message, if the request failed.
    pub error: Option<String>,
    /// Response payload, if the request succeeded.
    pub response: Option<T>,
}

impl<T> ApiResult<T> {
    /// Successful result.
    pub fn ok(response: T) -> Self {
        Self {
            created: Utc::now(),
            error: None,
            response: Some(response),
        }
    }

    /// Failed result.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            created: Utc::now(),
            error: Some(message.into()),
            response: None,
        }
    }

    /// Whether the result carries an error.
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Body of a create-subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubscription {
    /// Unique subscriber name.
    pub name: String,
    /// Callback URL receiving pushed change records.
    pub url: String,
    /// Delivery timeout in seconds; 0 means no timeout.
    pub timeout: u32,
}

/// Full subscription as returned to its creator, including the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    /// Subscription id.
    pub id: u64,
    /// Subscriber name.
    pub name: String,
    /// Callback URL.
    pub url: String,
    /// Delivery timeout in seconds.
    pub timeout: u32,
    /// Bearer token required to delete the subscription.
    pub session_token: String,
}

/// Public view of a subscription; URL and token are withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Subscription id.
    pub id: u64,
    /// Subscriber name.
    pub name: String,
}

impl From<&SubscriptionDetails> for SubscriptionInfo {
    fn from(details: &SubscriptionDetails) -> Self {
        Self {
            id: details.id,
            name: details.name.clone(),
        }
    }
}
