use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crm_core::{WebhookEvent, WebhookTarget};
use crm_db::WebhookConfigRepository;
use crm_engine::{DispatchSummary, WebhookSink};

use crate::error::{Result, WebhookError};

/// Fans a single event out to every configured endpoint. Deliveries run
/// concurrently; a failed or slow endpoint only costs its own request.
/// Nothing here can fail a caller: errors are logged and counted.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    configs: WebhookConfigRepository,
}

impl WebhookDispatcher {
    pub fn new(pool: SqlitePool, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| WebhookError::client(e.to_string()))?;
        Ok(Self {
            client,
            configs: WebhookConfigRepository::new(pool),
        })
    }

    /// Posts `payload` once to an explicit URL, bypassing the config lookup.
    /// Used to test-fire an endpoint before subscribing it.
    pub async fn send_once(
        &self,
        url: &str,
        target: WebhookTarget,
        event: WebhookEvent,
        payload: serde_json::Value,
    ) -> bool {
        self.post(url, &envelope(target, event, payload)).await
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> bool {
        match self.client.post(url).json(body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("webhook {} answered {}", url, response.status());
                false
            }
            Err(error) => {
                warn!("webhook {} failed: {}", url, error);
                false
            }
        }
    }
}

fn envelope(
    target: WebhookTarget,
    event: WebhookEvent,
    payload: serde_json::Value,
) -> serde_json::Value {
    json!({
        "event": format!("{}.{}", target.as_str(), event.as_str()),
        "data": payload,
    })
}

#[async_trait]
impl WebhookSink for WebhookDispatcher {
    async fn dispatch(
        &self,
        target: WebhookTarget,
        target_id: Uuid,
        event: WebhookEvent,
        payload: serde_json::Value,
    ) -> DispatchSummary {
        let configs = match self.configs.find_matching(target, target_id, event).await {
            Ok(configs) => configs,
            Err(error) => {
                warn!("webhook config lookup failed: {}", error);
                return DispatchSummary::default();
            }
        };
        if configs.is_empty() {
            return DispatchSummary::default();
        }

        let body = envelope(target, event, payload);
        debug!(
            "dispatching {}.{} for {} to {} endpoint(s)",
            target.as_str(),
            event.as_str(),
            target_id,
            configs.len()
        );

        let deliveries = configs.iter().map(|config| self.post(&config.url, &body));
        let results = join_all(deliveries).await;

        DispatchSummary {
            dispatched: results.len(),
            succeeded: results.into_iter().filter(|ok| *ok).count(),
        }
    }
}
