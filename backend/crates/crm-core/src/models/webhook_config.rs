use crate::{CoreError, CoreResult};

use std::panic::Location;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookTarget {
    Funnel,
    Stage,
    Opportunity,
}

impl WebhookTarget {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Funnel => "funnel",
            Self::Stage => "stage",
            Self::Opportunity => "opportunity",
        }
    }
}

impl FromStr for WebhookTarget {
    type Err = CoreError;

    #[track_caller]
    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "funnel" => Ok(Self::Funnel),
            "stage" => Ok(Self::Stage),
            "opportunity" => Ok(Self::Opportunity),
            _ => Err(CoreError::InvalidWebhookTarget {
                value: s.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    Create,
    Update,
    Move,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Move => "move",
        }
    }
}

impl FromStr for WebhookEvent {
    type Err = CoreError;

    #[track_caller]
    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "move" => Ok(Self::Move),
            _ => Err(CoreError::InvalidWebhookEvent {
                value: s.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// An outbound subscription. Many configs may match one
/// (target_type, target_id, event) triple; each is dispatched independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub id: Uuid,
    pub target_type: WebhookTarget,
    pub target_id: Uuid,
    pub url: String,
    pub event: WebhookEvent,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl WebhookConfig {
    pub fn new(target_type: WebhookTarget, target_id: Uuid, url: String, event: WebhookEvent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            target_type,
            target_id,
            url,
            event,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
