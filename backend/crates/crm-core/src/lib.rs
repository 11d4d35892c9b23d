pub mod error;
pub mod models;

pub use error::{CoreError, CoreResult};
pub use models::field_type::FieldType;
pub use models::funnel::Funnel;
pub use models::opportunity::Opportunity;
pub use models::required_field::RequiredField;
pub use models::stage::{MigrateTarget, Stage};
pub use models::webhook_config::{WebhookConfig, WebhookEvent, WebhookTarget};

#[cfg(test)]
mod tests;
