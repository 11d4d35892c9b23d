use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid move: {message} {location}")]
    InvalidMove {
        message: String,
        location: ErrorLocation,
    },

    #[error("Opportunity {opportunity_id} already has a transition in flight {location}")]
    TransitionInFlight {
        opportunity_id: Uuid,
        location: ErrorLocation,
    },

    #[error("Persistence failed: {message} {location}")]
    Persistence {
        message: String,
        location: ErrorLocation,
    },

    #[error("Persistence timed out after {timeout_secs}s {location}")]
    PersistenceTimeout {
        timeout_secs: u64,
        location: ErrorLocation,
    },

    #[error("Dialog failed: {message} {location}")]
    Dialog {
        message: String,
        location: ErrorLocation,
    },
}

impl EngineError {
    #[track_caller]
    pub fn invalid_move<S: Into<String>>(message: S) -> Self {
        Self::InvalidMove {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
