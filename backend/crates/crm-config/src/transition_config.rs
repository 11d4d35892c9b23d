use crate::{ConfigError, ConfigErrorResult, DEFAULT_PERSIST_TIMEOUT_SECS};

use serde::Deserialize;

/// Bounds for the stage-transition engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Timeout applied to persistence calls inside a transition.
    /// Expiry rolls the move back. Webhook dispatch is never bounded
    /// this way.
    pub persist_timeout_secs: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            persist_timeout_secs: DEFAULT_PERSIST_TIMEOUT_SECS,
        }
    }
}

impl TransitionConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.persist_timeout_secs == 0 {
            return Err(ConfigError::config(
                "transition.persist_timeout_secs must be > 0",
            ));
        }

        Ok(())
    }
}
