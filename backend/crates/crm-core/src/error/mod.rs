use std::result::Result as StdResult;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid field type: {value} {location}")]
    InvalidFieldType {
        value: String,
        location: ErrorLocation,
    },

    #[error("Invalid webhook target: {value} {location}")]
    InvalidWebhookTarget {
        value: String,
        location: ErrorLocation,
    },

    #[error("Invalid webhook event: {value} {location}")]
    InvalidWebhookEvent {
        value: String,
        location: ErrorLocation,
    },

    #[error("UUID parse error: {source} {location}")]
    Uuid {
        source: uuid::Error,
        location: ErrorLocation,
    },
}

pub type CoreResult<T> = StdResult<T, CoreError>;
