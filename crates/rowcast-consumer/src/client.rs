//! Client for the rowcast subscription API.

use rowcast_proto::{ApiResult, CreateSubscription, SubscriptionDetails, SubscriptionInfo};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// Calls the subscription endpoints of a rowcast service.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/subscription{}", self.base_url, path)
    }

    /// Create a subscription. The request is sent as a urlencoded form.
    pub async fn subscribe(
        &self,
        request: &CreateSubscription,
    ) -> Result<SubscriptionDetails, AppError> {
        debug!(name = %request.name, url = %request.url, "subscribing");
        let response = self.http.post(self.url("")).form(request).send().await?;
        unwrap_result(response).await
    }

    /// Delete the subscription holding `token`.
    pub async fn unsubscribe(&self, token: &str) -> Result<SubscriptionInfo, AppError> {
        debug!("unsubscribing");
        let response = self
            .http
            .delete(self.url(&format!("/{}", token)))
            .send()
            .await?;
        unwrap_result(response).await
    }
}

async fn unwrap_result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    let result: ApiResult<T> = response.json().await?;

    match (result.error, result.response) {
        (None, Some(value)) => Ok(value),
        (Some(error), _) => Err(AppError::Service(error)),
        (None, None) => Err(AppError::Service(format!("empty response ({})", status))),
    }
}
