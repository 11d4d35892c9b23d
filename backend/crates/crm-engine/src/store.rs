use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crm_core::Opportunity;

use crate::error::EngineResult;

/// Persistence port for the transition orchestrator. Implementations return
/// the opportunity as stored so the caller always holds the authoritative row.
#[async_trait]
pub trait OpportunityStore: Send + Sync {
    /// Moves the opportunity to `stage_id` at board position `position`,
    /// stamping its last-stage-change timestamp.
    async fn update_stage(
        &self,
        opportunity_id: Uuid,
        stage_id: Uuid,
        position: i32,
    ) -> EngineResult<Opportunity>;

    /// Merges `values` into the opportunity's custom fields.
    async fn update_custom_fields(
        &self,
        opportunity_id: Uuid,
        values: &HashMap<String, String>,
    ) -> EngineResult<Opportunity>;

    /// Sets the win and/or loss reason. `None` leaves a reason untouched.
    async fn update_reasons(
        &self,
        opportunity_id: Uuid,
        win_reason: Option<&str>,
        loss_reason: Option<&str>,
    ) -> EngineResult<Opportunity>;

    /// Copies `source` into another funnel's stage as a fresh opportunity,
    /// used when the destination stage migrates arrivals elsewhere.
    async fn clone_into_stage(
        &self,
        source: &Opportunity,
        funnel_id: Uuid,
        stage_id: Uuid,
    ) -> EngineResult<Opportunity>;
}
