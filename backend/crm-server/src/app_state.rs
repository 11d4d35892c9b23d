use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crm_engine::InFlightRegistry;
use crm_webhooks::WebhookDispatcher;

/// Shared state handed to every handler. Cheap to clone; the registry and
/// dispatcher are shared so concurrent requests see the same claims and
/// reuse one HTTP client.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub in_flight: InFlightRegistry,
    pub persist_timeout: Duration,
}

impl AppState {
    pub fn new(pool: SqlitePool, dispatcher: Arc<WebhookDispatcher>, persist_timeout: Duration) -> Self {
        Self {
            pool,
            dispatcher,
            in_flight: InFlightRegistry::new(),
            persist_timeout,
        }
    }
}
