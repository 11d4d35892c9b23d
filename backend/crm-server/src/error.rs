use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Config error: {0}")]
    Config(#[from] crm_config::ConfigError),

    #[error("Database error: {0}")]
    Db(#[from] crm_db::DbError),

    #[error("Webhook client error: {0}")]
    Webhooks(#[from] crm_webhooks::WebhookError),

    #[error("Logger error: {message}")]
    Logger { message: String },
}

pub type Result<T> = std::result::Result<T, ServerError>;
