use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;

use crm_core::CoreError;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLx error: {source} {location}")]
    Sqlx {
        source: sqlx::Error,
        location: ErrorLocation,
    },

    #[error("Migration error: {message} {location}")]
    Migration {
        message: String,
        location: ErrorLocation,
    },

    #[error("Database initialization failed: {message} {location}")]
    Initialization {
        message: String,
        location: ErrorLocation,
    },

    #[error("Row decode failed: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },
}

impl DbError {
    #[track_caller]
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<sqlx::Error> for DbError {
    #[track_caller]
    fn from(source: sqlx::Error) -> Self {
        Self::Sqlx {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<uuid::Error> for DbError {
    #[track_caller]
    fn from(source: uuid::Error) -> Self {
        Self::Decode {
            message: source.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<CoreError> for DbError {
    #[track_caller]
    fn from(source: CoreError) -> Self {
        Self::Decode {
            message: source.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
