//! Funnel REST API handlers

use crate::api::DeleteResponse;
use crate::api::error::{ApiError, Result as ApiResult};
use crate::app_state::AppState;

use crm_core::{Funnel, Opportunity, Stage};
use crm_db::{FunnelRepository, OpportunityRepository, StageRepository};

use std::panic::Location;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateFunnelRequest {
    pub name: String,
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFunnelRequest {
    pub name: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct FunnelResponse {
    pub funnel: Funnel,
}

#[derive(Debug, Serialize)]
pub struct FunnelListResponse {
    pub funnels: Vec<Funnel>,
}

/// One stage column with its opportunities in board order
#[derive(Debug, Serialize)]
pub struct BoardLane {
    pub stage: Stage,
    pub opportunities: Vec<Opportunity>,
}

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub funnel: Funnel,
    pub lanes: Vec<BoardLane>,
}

/// GET /api/v1/funnels
pub async fn list_funnels(State(state): State<AppState>) -> ApiResult<Json<FunnelListResponse>> {
    let repo = FunnelRepository::new(state.pool.clone());
    let funnels = repo.find_all().await?;

    Ok(Json(FunnelListResponse { funnels }))
}

/// GET /api/v1/funnels/:id
pub async fn get_funnel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FunnelResponse>> {
    let funnel_id = Uuid::parse_str(&id)?;

    let repo = FunnelRepository::new(state.pool.clone());
    let funnel = repo
        .find_by_id(funnel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Funnel {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(Json(FunnelResponse { funnel }))
}

/// POST /api/v1/funnels
pub async fn create_funnel(
    State(state): State<AppState>,
    Json(req): Json<CreateFunnelRequest>,
) -> ApiResult<Json<FunnelResponse>> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation {
            message: "Funnel name cannot be empty".to_string(),
            field: Some("name".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let funnel = Funnel::new(name, req.position.unwrap_or(0));
    let repo = FunnelRepository::new(state.pool.clone());
    repo.create(&funnel).await?;

    log::info!("Created funnel {} ({})", funnel.id, funnel.name);

    Ok(Json(FunnelResponse { funnel }))
}

/// PUT /api/v1/funnels/:id
pub async fn update_funnel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFunnelRequest>,
) -> ApiResult<Json<FunnelResponse>> {
    let funnel_id = Uuid::parse_str(&id)?;

    let repo = FunnelRepository::new(state.pool.clone());
    let mut funnel = repo
        .find_by_id(funnel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Funnel {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if let Some(name) = &req.name {
        let trimmed = name.trim().to_string();
        if trimmed.is_empty() {
            return Err(ApiError::Validation {
                message: "Funnel name cannot be empty".to_string(),
                field: Some("name".into()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        funnel.name = trimmed;
    }
    if let Some(position) = req.position {
        funnel.position = position;
    }

    repo.update(&funnel).await?;

    Ok(Json(FunnelResponse { funnel }))
}

/// DELETE /api/v1/funnels/:id
pub async fn delete_funnel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let funnel_id = Uuid::parse_str(&id)?;

    let repo = FunnelRepository::new(state.pool.clone());
    repo.find_by_id(funnel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Funnel {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    repo.delete(funnel_id, Utc::now().timestamp()).await?;

    log::info!("Deleted funnel {}", funnel_id);

    Ok(Json(DeleteResponse {
        deleted_id: funnel_id.to_string(),
    }))
}

/// GET /api/v1/funnels/:id/board
///
/// The whole funnel as ordered lanes, the shape a kanban client renders.
pub async fn get_board(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BoardResponse>> {
    let funnel_id = Uuid::parse_str(&id)?;

    let funnel = FunnelRepository::new(state.pool.clone())
        .find_by_id(funnel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Funnel {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let stages = StageRepository::new(state.pool.clone())
        .find_by_funnel(funnel_id)
        .await?;
    let mut opportunities = OpportunityRepository::new(state.pool.clone())
        .find_by_funnel(funnel_id)
        .await?;

    let lanes = stages
        .into_iter()
        .map(|stage| {
            let mut lane: Vec<Opportunity> = Vec::new();
            opportunities.retain(|opportunity| {
                if opportunity.stage_id == stage.id {
                    lane.push(opportunity.clone());
                    false
                } else {
                    true
                }
            });
            lane.sort_by_key(|opportunity| opportunity.position);
            BoardLane {
                stage,
                opportunities: lane,
            }
        })
        .collect();

    Ok(Json(BoardResponse { funnel, lanes }))
}
