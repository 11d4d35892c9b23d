use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub funnel_id: Uuid,
    pub stage_id: Uuid,
    /// Ordering within the stage lane.
    pub position: i32,

    // Core fields
    pub title: String,
    pub client: String,
    pub value: f64,

    // Contact
    pub company: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,

    /// Open string-keyed map; keys are required-field names.
    pub custom_fields: HashMap<String, String>,

    // Set when the opportunity enters a win/loss stage that mandates one.
    pub win_reason: Option<String>,
    pub loss_reason: Option<String>,

    pub last_stage_change_at: Option<DateTime<Utc>>,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Opportunity {
    pub fn new(funnel_id: Uuid, stage_id: Uuid, title: String, client: String, value: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            funnel_id,
            stage_id,
            position: 0,
            title,
            client,
            value,
            company: None,
            phone: None,
            email: None,
            custom_fields: HashMap::new(),
            win_reason: None,
            loss_reason: None,
            last_stage_change_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
