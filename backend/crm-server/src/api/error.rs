//! REST API error types
//!
//! These errors are designed to produce consistent JSON responses
//! with appropriate HTTP status codes.

use crm_db::DbError;
use crm_engine::EngineError;

use std::panic::Location;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use error_location::ErrorLocation;
use serde::Serialize;
use thiserror::Error;

/// JSON error response body
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Inner error body with code, message, and optional field
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Field name if this is a validation error for a specific field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Required-field names the destination stage is still waiting on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<String>>,
}

/// API errors with associated HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {message} {location}")]
    NotFound {
        message: String,
        location: ErrorLocation,
    },

    /// Validation error (400)
    #[error("Validation failed: {message} {location}")]
    Validation {
        message: String,
        field: Option<String>,
        location: ErrorLocation,
    },

    /// A transition for the same opportunity is already running (409)
    #[error("Conflict: {message} {location}")]
    Conflict {
        message: String,
        location: ErrorLocation,
    },

    /// Destination stage requirements not satisfied (422)
    #[error("Stage requirements not met: {message} {location}")]
    UnmetRequirements {
        message: String,
        missing_fields: Vec<String>,
        location: ErrorLocation,
    },

    /// Internal server error (500)
    #[error("Internal error: {message} {location}")]
    Internal {
        message: String,
        location: ErrorLocation,
    },

    /// Bad request (400)
    #[error("Bad request: {message} {location}")]
    BadRequest {
        message: String,
        location: ErrorLocation,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log the error with location for debugging
        log::error!("{}", self);

        let (status, body) = match self {
            ApiError::NotFound { message, .. } => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".into(),
                    message,
                    field: None,
                    missing_fields: None,
                },
            ),
            ApiError::Validation { message, field, .. } => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "VALIDATION_ERROR".into(),
                    message,
                    field,
                    missing_fields: None,
                },
            ),
            ApiError::Conflict { message, .. } => (
                StatusCode::CONFLICT,
                ApiErrorBody {
                    code: "CONFLICT".into(),
                    message,
                    field: None,
                    missing_fields: None,
                },
            ),
            ApiError::UnmetRequirements {
                message,
                missing_fields,
                ..
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorBody {
                    code: "REQUIREMENTS_NOT_MET".into(),
                    message,
                    field: None,
                    missing_fields: Some(missing_fields),
                },
            ),
            ApiError::Internal { message, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody {
                    code: "INTERNAL_ERROR".into(),
                    message,
                    field: None,
                    missing_fields: None,
                },
            ),
            ApiError::BadRequest { message, .. } => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "BAD_REQUEST".into(),
                    message,
                    field: None,
                    missing_fields: None,
                },
            ),
        };

        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Convert UUID parse errors to API errors
impl From<uuid::Error> for ApiError {
    #[track_caller]
    fn from(e: uuid::Error) -> Self {
        ApiError::Validation {
            message: format!("Invalid UUID format: {}", e),
            field: None,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Convert database errors to API errors
impl From<DbError> for ApiError {
    #[track_caller]
    fn from(e: DbError) -> Self {
        // Log the database error for debugging
        log::error!("Database error: {}", e);

        match e {
            DbError::Sqlx { source, .. } => match source {
                sqlx::Error::RowNotFound => ApiError::NotFound {
                    message: "Resource not found".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                },
                _ => ApiError::Internal {
                    message: "Database operation failed".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                },
            },
            DbError::Migration { message, .. } => ApiError::Internal {
                message: format!("Database migration error: {}", message),
                location: ErrorLocation::from(Location::caller()),
            },
            DbError::Initialization { message, .. } => ApiError::Internal {
                message: format!("Database initialization error: {}", message),
                location: ErrorLocation::from(Location::caller()),
            },
            DbError::Decode { message, .. } => ApiError::Internal {
                message: format!("Database decode error: {}", message),
                location: ErrorLocation::from(Location::caller()),
            },
        }
    }
}

/// Convert engine errors to API errors
impl From<EngineError> for ApiError {
    #[track_caller]
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidMove { message, .. } => ApiError::Validation {
                message,
                field: None,
                location: ErrorLocation::from(Location::caller()),
            },
            EngineError::TransitionInFlight { opportunity_id, .. } => ApiError::Conflict {
                message: format!(
                    "A move of opportunity {} is already in progress",
                    opportunity_id
                ),
                location: ErrorLocation::from(Location::caller()),
            },
            EngineError::PersistenceTimeout { timeout_secs, .. } => ApiError::Internal {
                message: format!("Move timed out after {}s", timeout_secs),
                location: ErrorLocation::from(Location::caller()),
            },
            EngineError::Persistence { message, .. } | EngineError::Dialog { message, .. } => {
                ApiError::Internal {
                    message,
                    location: ErrorLocation::from(Location::caller()),
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
