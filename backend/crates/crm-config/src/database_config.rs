use crate::DEFAULT_DATABASE_FILENAME;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path, relative to the config directory.
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::from(DEFAULT_DATABASE_FILENAME),
            max_connections: 10,
        }
    }
}
