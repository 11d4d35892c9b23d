use crate::models::required_field::RequiredField;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Auto-clone destination applied when an opportunity arrives in a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateTarget {
    pub funnel_id: Uuid,
    pub stage_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub funnel_id: Uuid,

    pub name: String,
    pub color: String,
    pub position: i32,

    // Terminal flags. Mutually exclusive; at most one of each per funnel.
    pub is_win_stage: bool,
    pub is_loss_stage: bool,

    // Reason gating. Only meaningful combined with the matching flag.
    pub win_reason_required: bool,
    pub loss_reason_required: bool,
    pub win_reasons: Vec<String>,
    pub loss_reasons: Vec<String>,

    /// Days-in-stage threshold before the stage flags an opportunity.
    pub alert_after_days: Option<i32>,
    /// Auto-clone the opportunity into another funnel/stage on arrival.
    pub migrate_target: Option<MigrateTarget>,

    pub required_fields: Vec<RequiredField>,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Stage {
    pub fn new(funnel_id: Uuid, name: String, color: String, position: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            funnel_id,
            name,
            color,
            position,
            is_win_stage: false,
            is_loss_stage: false,
            win_reason_required: false,
            loss_reason_required: false,
            win_reasons: Vec::new(),
            loss_reasons: Vec::new(),
            alert_after_days: None,
            migrate_target: None,
            required_fields: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
