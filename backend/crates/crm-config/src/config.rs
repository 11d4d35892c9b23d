use crate::{
    ConfigError, ConfigErrorResult, DatabaseConfig, LoggingConfig, ServerConfig, TransitionConfig,
    WebhookClientConfig,
};

use std::path::PathBuf;
use std::str::FromStr;

use log::info;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub webhooks: WebhookClientConfig,
    pub transition: TransitionConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// Loading order:
    /// 1. Check for CRM_CONFIG_DIR env var, else use ./.crm/
    /// 2. Auto-create the config directory if it doesn't exist
    /// 3. Load config.toml if it exists, else use defaults
    /// 4. Apply CRM_* environment variable overrides
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        let config_dir = Self::config_dir()?;

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::Io {
                path: config_dir.clone(),
                source: e,
            })?;
        }

        let config_path = config_dir.join("config.toml");

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load and parse TOML file with detailed error context.
    fn load_toml(path: &PathBuf) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the config directory.
    /// Priority: CRM_CONFIG_DIR env var > ./.crm/ (relative to cwd)
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Ok(dir) = std::env::var("CRM_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(".crm"))
    }

    /// Validate all configuration.
    /// Call after load() to catch all errors at startup.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.server.validate()?;
        self.webhooks.validate()?;
        self.transition.validate()?;

        // Validate database path doesn't escape config dir
        let db_path = std::path::Path::new(&self.database.path);
        if db_path.is_absolute() || self.database.path.contains("..") {
            return Err(ConfigError::database(
                "database.path must be relative and cannot contain '..'",
            ));
        }

        Ok(())
    }

    /// Get absolute path to database file.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let config_dir = Self::config_dir()?;
        Ok(config_dir.join(&self.database.path))
    }

    /// Get bind address as string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Log configuration summary.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  server: {}:{}", self.server.host, self.server.port);
        info!(
            "  database: {} (max {} connections)",
            self.database.path, self.database.max_connections
        );
        info!(
            "  logging: {} (colored: {})",
            self.logging.level.0, self.logging.colored
        );
        info!(
            "  webhooks: request_timeout={}s",
            self.webhooks.request_timeout_secs
        );
        info!(
            "  transition: persist_timeout={}s",
            self.transition.persist_timeout_secs
        );
    }

    fn apply_env_overrides(&mut self) {
        // Server
        Self::apply_env_string("CRM_SERVER_HOST", &mut self.server.host);
        Self::apply_env_parse("CRM_SERVER_PORT", &mut self.server.port);

        // Database
        Self::apply_env_string("CRM_DATABASE_PATH", &mut self.database.path);
        Self::apply_env_parse(
            "CRM_DATABASE_MAX_CONNECTIONS",
            &mut self.database.max_connections,
        );

        // Logging
        if let Ok(value) = std::env::var("CRM_LOG_LEVEL") {
            self.logging.level = value
                .parse()
                .unwrap_or(crate::LogLevel(crate::DEFAULT_LOG_LEVEL));
        }
        Self::apply_env_option_string("CRM_LOG_FILE", &mut self.logging.file);

        // Webhooks / transition
        Self::apply_env_parse(
            "CRM_WEBHOOK_TIMEOUT_SECS",
            &mut self.webhooks.request_timeout_secs,
        );
        Self::apply_env_parse(
            "CRM_PERSIST_TIMEOUT_SECS",
            &mut self.transition.persist_timeout_secs,
        );
    }

    fn apply_env_string(key: &str, target: &mut String) {
        if let Ok(value) = std::env::var(key) {
            *target = value;
        }
    }

    fn apply_env_option_string(key: &str, target: &mut Option<String>) {
        if let Ok(value) = std::env::var(key) {
            *target = if value.is_empty() { None } else { Some(value) };
        }
    }

    fn apply_env_parse<T: FromStr>(key: &str, target: &mut T) {
        if let Ok(value) = std::env::var(key)
            && let Ok(parsed) = value.parse::<T>()
        {
            *target = parsed;
        }
    }
}
