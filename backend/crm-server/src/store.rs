use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crm_core::Opportunity;
use crm_db::OpportunityRepository;
use crm_engine::{EngineError, EngineResult, OpportunityStore};

/// Persistence port of the transition engine backed by the SQLite
/// repositories. Database failures surface as engine persistence errors so
/// the orchestrator rolls the board back.
pub struct DbOpportunityStore {
    repo: OpportunityRepository,
}

impl DbOpportunityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: OpportunityRepository::new(pool),
        }
    }

    fn found(opportunity: Option<Opportunity>, id: Uuid) -> EngineResult<Opportunity> {
        opportunity.ok_or_else(|| EngineError::persistence(format!("opportunity {id} not found")))
    }
}

#[async_trait]
impl OpportunityStore for DbOpportunityStore {
    async fn update_stage(
        &self,
        opportunity_id: Uuid,
        stage_id: Uuid,
        position: i32,
    ) -> EngineResult<Opportunity> {
        let updated = self
            .repo
            .update_stage(opportunity_id, stage_id, position)
            .await
            .map_err(|e| EngineError::persistence(e.to_string()))?;
        Self::found(updated, opportunity_id)
    }

    async fn update_custom_fields(
        &self,
        opportunity_id: Uuid,
        values: &HashMap<String, String>,
    ) -> EngineResult<Opportunity> {
        let updated = self
            .repo
            .update_custom_fields(opportunity_id, values)
            .await
            .map_err(|e| EngineError::persistence(e.to_string()))?;
        Self::found(updated, opportunity_id)
    }

    async fn update_reasons(
        &self,
        opportunity_id: Uuid,
        win_reason: Option<&str>,
        loss_reason: Option<&str>,
    ) -> EngineResult<Opportunity> {
        let updated = self
            .repo
            .update_reasons(opportunity_id, win_reason, loss_reason)
            .await
            .map_err(|e| EngineError::persistence(e.to_string()))?;
        Self::found(updated, opportunity_id)
    }

    async fn clone_into_stage(
        &self,
        source: &Opportunity,
        funnel_id: Uuid,
        stage_id: Uuid,
    ) -> EngineResult<Opportunity> {
        self.repo
            .clone_into_stage(source, funnel_id, stage_id)
            .await
            .map_err(|e| EngineError::persistence(e.to_string()))
    }
}
