mod config;
mod database_config;
mod error;
mod log_level;
mod logging_config;
mod server_config;
mod transition_config;
mod webhook_client_config;

pub use config::Config;
pub use database_config::DatabaseConfig;
pub use error::{ConfigError, ConfigErrorResult};
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use server_config::ServerConfig;
pub use transition_config::TransitionConfig;
pub use webhook_client_config::WebhookClientConfig;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8400;
const DEFAULT_DATABASE_FILENAME: &str = "crm.db";
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
const DEFAULT_LOG_DIRECTORY: &str = "log";
const DEFAULT_PERSIST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 15;
const MIN_PORT: u16 = 1024;

#[cfg(test)]
mod tests;
