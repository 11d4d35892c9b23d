use crate::{ConfigError, ConfigErrorResult, DEFAULT_WEBHOOK_TIMEOUT_SECS};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookClientConfig {
    /// Per-request timeout for outbound webhook deliveries.
    pub request_timeout_secs: u64,
}

impl Default for WebhookClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_WEBHOOK_TIMEOUT_SECS,
        }
    }
}

impl WebhookClientConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::config(
                "webhooks.request_timeout_secs must be > 0",
            ));
        }

        Ok(())
    }
}
