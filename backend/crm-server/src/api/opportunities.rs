//! Opportunity REST API handlers
//!
//! The move endpoint runs the full transition pipeline. The request body
//! stands in for the interactive dialogs: `fields` answers the required-field
//! prompt and `reason` answers the win/loss prompt. When the payload does not
//! satisfy a gate the move rolls back and the response says what was missing.

use crate::api::DeleteResponse;
use crate::api::error::{ApiError, Result as ApiResult};
use crate::app_state::AppState;
use crate::store::DbOpportunityStore;

use crm_core::{Opportunity, RequiredField, WebhookEvent, WebhookTarget};
use crm_db::{OpportunityRepository, StageRepository};
use crm_engine::{
    BoardSnapshot, BoardState, DialogOutcome, DispatchSummary, EngineResult, LogNotifier,
    MoveRequest, ReasonDialog, ReasonKind, RequiredFieldsDialog, StageLane,
    TransitionOrchestrator, WebhookSink, is_field_missing,
};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateOpportunityRequest {
    pub funnel_id: String,
    pub stage_id: String,
    pub title: String,
    pub client: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub custom_fields: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOpportunityRequest {
    pub title: Option<String>,
    pub client: Option<String>,
    pub value: Option<f64>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub custom_fields: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct OpportunityResponse {
    pub opportunity: Opportunity,
}

#[derive(Debug, Serialize)]
pub struct OpportunityListResponse {
    pub opportunities: Vec<Opportunity>,
}

#[derive(Debug, Deserialize)]
pub struct MoveOpportunityRequest {
    pub to_stage_id: String,
    pub to_index: usize,
    /// Values for the destination stage's unfilled required fields.
    #[serde(default)]
    pub fields: Option<HashMap<String, String>>,
    /// Win or loss reason, when the destination stage demands one.
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookSummaryBody {
    pub dispatched: usize,
    pub succeeded: usize,
}

impl From<DispatchSummary> for WebhookSummaryBody {
    fn from(summary: DispatchSummary) -> Self {
        Self {
            dispatched: summary.dispatched,
            succeeded: summary.succeeded,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    pub moved: bool,
    pub opportunity: Opportunity,
    pub webhooks: WebhookSummaryBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrated: Option<Opportunity>,
}

/// GET /api/v1/stages/:id/opportunities
pub async fn list_by_stage(
    State(state): State<AppState>,
    Path(stage_id): Path<String>,
) -> ApiResult<Json<OpportunityListResponse>> {
    let stage_id = Uuid::parse_str(&stage_id)?;

    let repo = OpportunityRepository::new(state.pool.clone());
    let opportunities = repo.find_by_stage(stage_id).await?;

    Ok(Json(OpportunityListResponse { opportunities }))
}

/// GET /api/v1/opportunities/:id
pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OpportunityResponse>> {
    let opportunity_id = Uuid::parse_str(&id)?;

    let repo = OpportunityRepository::new(state.pool.clone());
    let opportunity = repo
        .find_by_id(opportunity_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Opportunity {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(Json(OpportunityResponse { opportunity }))
}

/// POST /api/v1/opportunities
pub async fn create_opportunity(
    State(state): State<AppState>,
    Json(req): Json<CreateOpportunityRequest>,
) -> ApiResult<Json<OpportunityResponse>> {
    let funnel_id = Uuid::parse_str(&req.funnel_id)?;
    let stage_id = Uuid::parse_str(&req.stage_id)?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation {
            message: "Opportunity title cannot be empty".to_string(),
            field: Some("title".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    StageRepository::new(state.pool.clone())
        .find_by_id(stage_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Stage {} not found", stage_id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let mut opportunity = Opportunity::new(funnel_id, stage_id, title, req.client, req.value);
    opportunity.company = req.company;
    opportunity.phone = req.phone;
    opportunity.email = req.email;
    opportunity.custom_fields = req.custom_fields;

    let repo = OpportunityRepository::new(state.pool.clone());
    let opportunity = repo.create(&opportunity).await?;

    let payload = serde_json::to_value(&opportunity).unwrap_or(serde_json::Value::Null);
    state
        .dispatcher
        .dispatch(
            WebhookTarget::Opportunity,
            opportunity.id,
            WebhookEvent::Create,
            payload,
        )
        .await;

    log::info!(
        "Created opportunity {} ({})",
        opportunity.id,
        opportunity.title
    );

    Ok(Json(OpportunityResponse { opportunity }))
}

/// PUT /api/v1/opportunities/:id
pub async fn update_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOpportunityRequest>,
) -> ApiResult<Json<OpportunityResponse>> {
    let opportunity_id = Uuid::parse_str(&id)?;

    let repo = OpportunityRepository::new(state.pool.clone());
    let mut opportunity = repo
        .find_by_id(opportunity_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Opportunity {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if let Some(title) = &req.title {
        let trimmed = title.trim().to_string();
        if trimmed.is_empty() {
            return Err(ApiError::Validation {
                message: "Opportunity title cannot be empty".to_string(),
                field: Some("title".into()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        opportunity.title = trimmed;
    }
    if let Some(client) = req.client {
        opportunity.client = client;
    }
    if let Some(value) = req.value {
        opportunity.value = value;
    }
    if let Some(company) = req.company {
        opportunity.company = Some(company);
    }
    if let Some(phone) = req.phone {
        opportunity.phone = Some(phone);
    }
    if let Some(email) = req.email {
        opportunity.email = Some(email);
    }
    if let Some(custom_fields) = req.custom_fields {
        opportunity.custom_fields.extend(custom_fields);
    }

    repo.update(&opportunity).await?;

    let payload = serde_json::to_value(&opportunity).unwrap_or(serde_json::Value::Null);
    state
        .dispatcher
        .dispatch(
            WebhookTarget::Opportunity,
            opportunity.id,
            WebhookEvent::Update,
            payload,
        )
        .await;

    Ok(Json(OpportunityResponse { opportunity }))
}

/// DELETE /api/v1/opportunities/:id
///
/// Soft delete; the record stays for reporting but leaves every board.
pub async fn archive_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let opportunity_id = Uuid::parse_str(&id)?;

    let repo = OpportunityRepository::new(state.pool.clone());
    repo.find_by_id(opportunity_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Opportunity {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    repo.archive(opportunity_id, Utc::now().timestamp()).await?;

    log::info!("Archived opportunity {}", opportunity_id);

    Ok(Json(DeleteResponse {
        deleted_id: opportunity_id.to_string(),
    }))
}

/// Answers the required-field prompt from the request payload. Completes
/// only when the supplied values satisfy every missing field, otherwise it
/// cancels and records what was still unmet so the handler can report it.
struct PayloadFieldsDialog {
    values: HashMap<String, String>,
    unmet: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RequiredFieldsDialog for PayloadFieldsDialog {
    async fn present(
        &self,
        opportunity: &Opportunity,
        missing: &[RequiredField],
    ) -> EngineResult<DialogOutcome<HashMap<String, String>>> {
        let mut patched = opportunity.clone();
        for (name, value) in &self.values {
            patched.custom_fields.insert(name.clone(), value.clone());
        }

        let unmet: Vec<String> = missing
            .iter()
            .filter(|field| is_field_missing(field, &patched))
            .map(|field| field.name.clone())
            .collect();
        if unmet.is_empty() {
            let answers = missing
                .iter()
                .filter_map(|field| {
                    self.values
                        .get(&field.name)
                        .map(|value| (field.name.clone(), value.clone()))
                })
                .collect();
            return Ok(DialogOutcome::Completed(answers));
        }

        if let Ok(mut slot) = self.unmet.lock() {
            *slot = unmet;
        }
        Ok(DialogOutcome::Cancelled)
    }
}

/// Answers the win/loss reason prompt from the request payload. The reason
/// must match one of the stage's configured choices when any exist.
struct PayloadReasonDialog {
    reason: Option<String>,
    unmet: Arc<Mutex<Option<ReasonKind>>>,
}

#[async_trait]
impl ReasonDialog for PayloadReasonDialog {
    async fn present(
        &self,
        _opportunity: &Opportunity,
        kind: ReasonKind,
        choices: &[String],
    ) -> EngineResult<DialogOutcome<String>> {
        if let Some(reason) = &self.reason
            && !reason.trim().is_empty()
            && (choices.is_empty() || choices.contains(reason))
        {
            return Ok(DialogOutcome::Completed(reason.clone()));
        }

        if let Ok(mut slot) = self.unmet.lock() {
            *slot = Some(kind);
        }
        Ok(DialogOutcome::Cancelled)
    }
}

fn lane_for(stage_id: Uuid, opportunities: &[Opportunity]) -> StageLane {
    StageLane::new(stage_id, opportunities.iter().map(|o| o.id).collect())
}

/// POST /api/v1/opportunities/:id/move
pub async fn move_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MoveOpportunityRequest>,
) -> ApiResult<Json<MoveResponse>> {
    let opportunity_id = Uuid::parse_str(&id)?;
    let to_stage_id = Uuid::parse_str(&req.to_stage_id)?;

    let opportunity_repo = OpportunityRepository::new(state.pool.clone());
    let opportunity = opportunity_repo
        .find_by_id(opportunity_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Opportunity {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let destination = StageRepository::new(state.pool.clone())
        .find_by_id(to_stage_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Stage {} not found", to_stage_id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let from_stage_id = opportunity.stage_id;

    // The board only needs the two lanes the move touches.
    let source_lane = lane_for(
        from_stage_id,
        &opportunity_repo.find_by_stage(from_stage_id).await?,
    );
    let mut lanes = vec![source_lane];
    if to_stage_id != from_stage_id {
        lanes.push(lane_for(
            to_stage_id,
            &opportunity_repo.find_by_stage(to_stage_id).await?,
        ));
    }
    let mut board = BoardState::new(BoardSnapshot::new(lanes));

    let unmet_fields = Arc::new(Mutex::new(Vec::new()));
    let unmet_reason = Arc::new(Mutex::new(None));
    let orchestrator = TransitionOrchestrator::new(
        Arc::new(DbOpportunityStore::new(state.pool.clone())),
        Arc::new(PayloadFieldsDialog {
            values: req.fields.unwrap_or_default(),
            unmet: Arc::clone(&unmet_fields),
        }),
        Arc::new(PayloadReasonDialog {
            reason: req.reason,
            unmet: Arc::clone(&unmet_reason),
        }),
        state.dispatcher.clone(),
        Arc::new(LogNotifier),
        state.persist_timeout,
        state.in_flight.clone(),
    );

    let request = MoveRequest {
        opportunity_id,
        from_stage_id,
        to_stage_id,
        to_index: req.to_index,
    };
    let outcome = orchestrator
        .run(&mut board, &destination, opportunity, request)
        .await?;

    if !outcome.committed {
        let missing_fields = unmet_fields
            .lock()
            .map(|names| names.clone())
            .unwrap_or_default();
        let reason_kind = unmet_reason.lock().ok().and_then(|slot| *slot);

        if !missing_fields.is_empty() {
            return Err(ApiError::UnmetRequirements {
                message: format!(
                    "Stage \"{}\" requires fields that were not provided",
                    destination.name
                ),
                missing_fields,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if let Some(kind) = reason_kind {
            return Err(ApiError::UnmetRequirements {
                message: format!(
                    "Stage \"{}\" requires a {} reason",
                    destination.name,
                    kind.as_str()
                ),
                missing_fields: Vec::new(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        // Dropped in place; nothing changed and nothing was required.
        return Ok(Json(MoveResponse {
            moved: false,
            opportunity: outcome.opportunity,
            webhooks: outcome.webhooks.into(),
            migrated: None,
        }));
    }

    Ok(Json(MoveResponse {
        moved: true,
        opportunity: outcome.opportunity,
        webhooks: outcome.webhooks.into(),
        migrated: outcome.migrated,
    }))
}
