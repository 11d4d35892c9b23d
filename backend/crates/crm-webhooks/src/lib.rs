pub mod dispatcher;
pub mod error;

pub use dispatcher::WebhookDispatcher;
pub use error::{Result, WebhookError};
