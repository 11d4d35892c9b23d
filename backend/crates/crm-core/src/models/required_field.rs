use crate::models::field_type::FieldType;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A custom-data slot a stage demands be filled before an opportunity
/// may enter it. The field NAME is the join key against an opportunity's
/// custom-field map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredField {
    pub id: Uuid,
    pub stage_id: Uuid,

    pub name: String,
    pub field_type: FieldType,
    /// Choices for select fields; empty for every other type.
    pub options: Vec<String>,
    pub is_required: bool,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RequiredField {
    pub fn new(stage_id: Uuid, name: String, field_type: FieldType, is_required: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stage_id,
            name,
            field_type,
            options: Vec::new(),
            is_required,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
