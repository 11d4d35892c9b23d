use async_trait::async_trait;
use uuid::Uuid;

use crm_core::{WebhookEvent, WebhookTarget};

/// Outcome of a webhook fan-out. Failures are counted, never raised, so a
/// dead endpoint cannot undo a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    pub dispatched: usize,
    pub succeeded: usize,
}

impl DispatchSummary {
    pub fn merge(self, other: DispatchSummary) -> DispatchSummary {
        DispatchSummary {
            dispatched: self.dispatched + other.dispatched,
            succeeded: self.succeeded + other.succeeded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dispatched == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.dispatched
    }
}

/// Outbound notification port. Implementations look up the configured
/// endpoints for `(target, target_id, event)` and post `payload` to each.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn dispatch(
        &self,
        target: WebhookTarget,
        target_id: Uuid,
        event: WebhookEvent,
        payload: serde_json::Value,
    ) -> DispatchSummary;
}
