pub mod connection;
pub mod error;
pub mod repositories;

pub use connection::{create_pool, run_migrations};
pub use error::{DbError, Result};
pub use repositories::funnel_repository::FunnelRepository;
pub use repositories::opportunity_repository::OpportunityRepository;
pub use repositories::stage_repository::StageRepository;
pub use repositories::webhook_config_repository::WebhookConfigRepository;
