use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("HTTP client initialization failed: {message} {location}")]
    Client {
        message: String,
        location: ErrorLocation,
    },
}

impl WebhookError {
    #[track_caller]
    pub fn client<S: Into<String>>(message: S) -> Self {
        Self::Client {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WebhookError>;
