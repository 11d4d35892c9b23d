//! Stage REST API handlers
//!
//! Stages carry the transition policy: terminal win/loss flags, reason
//! gating, required fields, day-count alerts, and migrate targets. The
//! validation here keeps a funnel to at most one win and one loss stage.

use crate::api::DeleteResponse;
use crate::api::error::{ApiError, Result as ApiResult};
use crate::app_state::AppState;

use crm_core::{FieldType, MigrateTarget, RequiredField, Stage};
use crm_db::StageRepository;

use std::panic::Location;
use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateStageRequest {
    pub funnel_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub is_win_stage: bool,
    #[serde(default)]
    pub is_loss_stage: bool,
    #[serde(default)]
    pub win_reason_required: bool,
    #[serde(default)]
    pub loss_reason_required: bool,
    #[serde(default)]
    pub win_reasons: Vec<String>,
    #[serde(default)]
    pub loss_reasons: Vec<String>,
    #[serde(default)]
    pub alert_after_days: Option<i32>,
    #[serde(default)]
    pub migrate_target: Option<MigrateTargetRequest>,
}

#[derive(Debug, Deserialize)]
pub struct MigrateTargetRequest {
    pub funnel_id: String,
    pub stage_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStageRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub position: Option<i32>,
    pub is_win_stage: Option<bool>,
    pub is_loss_stage: Option<bool>,
    pub win_reason_required: Option<bool>,
    pub loss_reason_required: Option<bool>,
    pub win_reasons: Option<Vec<String>>,
    pub loss_reasons: Option<Vec<String>>,
    /// Double option so callers can clear the threshold with an explicit null.
    #[serde(default, deserialize_with = "double_option")]
    pub alert_after_days: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub migrate_target: Option<Option<MigrateTargetRequest>>,
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub stage: Stage,
}

#[derive(Debug, Serialize)]
pub struct StageListResponse {
    pub stages: Vec<Stage>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequiredFieldRequest {
    pub name: String,
    pub field_type: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "default_true")]
    pub is_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequiredFieldRequest {
    pub name: Option<String>,
    pub field_type: Option<String>,
    pub options: Option<Vec<String>>,
    pub is_required: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RequiredFieldResponse {
    pub field: RequiredField,
}

fn default_true() -> bool {
    true
}

/// Distinguishes an absent field (outer None, leave as-is) from an
/// explicit null (inner None, clear the value).
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

const DEFAULT_STAGE_COLOR: &str = "#6b7280";

fn parse_migrate_target(req: &MigrateTargetRequest) -> ApiResult<MigrateTarget> {
    Ok(MigrateTarget {
        funnel_id: Uuid::parse_str(&req.funnel_id)?,
        stage_id: Uuid::parse_str(&req.stage_id)?,
    })
}

fn parse_field_type(raw: &str) -> ApiResult<FieldType> {
    FieldType::from_str(raw).map_err(|_| ApiError::Validation {
        message: format!("Unknown field type '{}'", raw),
        field: Some("field_type".into()),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// Funnel-wide stage rules: the two terminal flags are mutually exclusive,
/// reason gating needs its matching flag, a funnel holds at most one stage
/// of each terminal kind, and stage positions are unique within the funnel.
fn validate_stage_rules(stage: &Stage, siblings: &[Stage]) -> ApiResult<()> {
    if stage.is_win_stage && stage.is_loss_stage {
        return Err(ApiError::Validation {
            message: "A stage cannot be both a win stage and a loss stage".to_string(),
            field: None,
            location: ErrorLocation::from(Location::caller()),
        });
    }
    if stage.win_reason_required && !stage.is_win_stage {
        return Err(ApiError::Validation {
            message: "win_reason_required is only valid on a win stage".to_string(),
            field: Some("win_reason_required".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    if stage.loss_reason_required && !stage.is_loss_stage {
        return Err(ApiError::Validation {
            message: "loss_reason_required is only valid on a loss stage".to_string(),
            field: Some("loss_reason_required".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    for sibling in siblings.iter().filter(|s| s.id != stage.id) {
        if sibling.position == stage.position {
            return Err(ApiError::Validation {
                message: format!(
                    "Position {} is already taken by stage '{}'",
                    stage.position, sibling.name
                ),
                field: Some("position".into()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if stage.is_win_stage && sibling.is_win_stage {
            return Err(ApiError::Validation {
                message: format!("Funnel already has a win stage ({})", sibling.name),
                field: Some("is_win_stage".into()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if stage.is_loss_stage && sibling.is_loss_stage {
            return Err(ApiError::Validation {
                message: format!("Funnel already has a loss stage ({})", sibling.name),
                field: Some("is_loss_stage".into()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    }

    Ok(())
}

/// GET /api/v1/funnels/:id/stages
pub async fn list_stages(
    State(state): State<AppState>,
    Path(funnel_id): Path<String>,
) -> ApiResult<Json<StageListResponse>> {
    let funnel_id = Uuid::parse_str(&funnel_id)?;

    let repo = StageRepository::new(state.pool.clone());
    let stages = repo.find_by_funnel(funnel_id).await?;

    Ok(Json(StageListResponse { stages }))
}

/// GET /api/v1/stages/:id
pub async fn get_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StageResponse>> {
    let stage_id = Uuid::parse_str(&id)?;

    let repo = StageRepository::new(state.pool.clone());
    let stage = repo
        .find_by_id(stage_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Stage {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(Json(StageResponse { stage }))
}

/// POST /api/v1/stages
pub async fn create_stage(
    State(state): State<AppState>,
    Json(req): Json<CreateStageRequest>,
) -> ApiResult<Json<StageResponse>> {
    let funnel_id = Uuid::parse_str(&req.funnel_id)?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation {
            message: "Stage name cannot be empty".to_string(),
            field: Some("name".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let repo = StageRepository::new(state.pool.clone());
    let siblings = repo.find_by_funnel(funnel_id).await?;

    // Without an explicit position the stage goes after the current last one.
    let position = req
        .position
        .unwrap_or_else(|| siblings.iter().map(|s| s.position + 1).max().unwrap_or(0));

    let mut stage = Stage::new(
        funnel_id,
        name,
        req.color.unwrap_or_else(|| DEFAULT_STAGE_COLOR.to_string()),
        position,
    );
    stage.is_win_stage = req.is_win_stage;
    stage.is_loss_stage = req.is_loss_stage;
    stage.win_reason_required = req.win_reason_required;
    stage.loss_reason_required = req.loss_reason_required;
    stage.win_reasons = req.win_reasons;
    stage.loss_reasons = req.loss_reasons;
    stage.alert_after_days = req.alert_after_days;
    if let Some(target) = &req.migrate_target {
        stage.migrate_target = Some(parse_migrate_target(target)?);
    }

    validate_stage_rules(&stage, &siblings)?;
    repo.create(&stage).await?;

    log::info!("Created stage {} ({})", stage.id, stage.name);

    Ok(Json(StageResponse { stage }))
}

/// PUT /api/v1/stages/:id
pub async fn update_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStageRequest>,
) -> ApiResult<Json<StageResponse>> {
    let stage_id = Uuid::parse_str(&id)?;

    let repo = StageRepository::new(state.pool.clone());
    let mut stage = repo
        .find_by_id(stage_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Stage {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if let Some(name) = &req.name {
        let trimmed = name.trim().to_string();
        if trimmed.is_empty() {
            return Err(ApiError::Validation {
                message: "Stage name cannot be empty".to_string(),
                field: Some("name".into()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        stage.name = trimmed;
    }
    if let Some(color) = req.color {
        stage.color = color;
    }
    if let Some(position) = req.position {
        stage.position = position;
    }
    if let Some(is_win) = req.is_win_stage {
        stage.is_win_stage = is_win;
    }
    if let Some(is_loss) = req.is_loss_stage {
        stage.is_loss_stage = is_loss;
    }
    if let Some(required) = req.win_reason_required {
        stage.win_reason_required = required;
    }
    if let Some(required) = req.loss_reason_required {
        stage.loss_reason_required = required;
    }
    if let Some(reasons) = req.win_reasons {
        stage.win_reasons = reasons;
    }
    if let Some(reasons) = req.loss_reasons {
        stage.loss_reasons = reasons;
    }
    if let Some(alert) = req.alert_after_days {
        stage.alert_after_days = alert;
    }
    if let Some(target) = req.migrate_target {
        stage.migrate_target = match target {
            Some(t) => Some(parse_migrate_target(&t)?),
            None => None,
        };
    }

    let siblings = repo.find_by_funnel(stage.funnel_id).await?;
    validate_stage_rules(&stage, &siblings)?;
    repo.update(&stage).await?;

    Ok(Json(StageResponse { stage }))
}

/// DELETE /api/v1/stages/:id
pub async fn delete_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let stage_id = Uuid::parse_str(&id)?;

    let repo = StageRepository::new(state.pool.clone());
    repo.find_by_id(stage_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Stage {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    repo.delete(stage_id, Utc::now().timestamp()).await?;

    log::info!("Deleted stage {}", stage_id);

    Ok(Json(DeleteResponse {
        deleted_id: stage_id.to_string(),
    }))
}

/// POST /api/v1/stages/:id/fields
pub async fn add_required_field(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateRequiredFieldRequest>,
) -> ApiResult<Json<RequiredFieldResponse>> {
    let stage_id = Uuid::parse_str(&id)?;

    let repo = StageRepository::new(state.pool.clone());
    let stage = repo
        .find_by_id(stage_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Stage {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation {
            message: "Field name cannot be empty".to_string(),
            field: Some("name".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    if stage
        .required_fields
        .iter()
        .any(|f| f.name.eq_ignore_ascii_case(&name))
    {
        return Err(ApiError::Validation {
            message: format!("Stage already has a field named '{}'", name),
            field: Some("name".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let field_type = parse_field_type(&req.field_type)?;
    if field_type == FieldType::Select && req.options.is_empty() {
        return Err(ApiError::Validation {
            message: "Select fields need at least one option".to_string(),
            field: Some("options".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut field = RequiredField::new(stage_id, name, field_type, req.is_required);
    field.options = req.options;

    repo.add_required_field(&field).await?;

    log::info!("Added required field {} to stage {}", field.name, stage_id);

    Ok(Json(RequiredFieldResponse { field }))
}

/// PUT /api/v1/fields/:id
pub async fn update_required_field(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequiredFieldRequest>,
) -> ApiResult<Json<RequiredFieldResponse>> {
    let field_id = Uuid::parse_str(&id)?;

    let repo = StageRepository::new(state.pool.clone());
    let mut field = repo
        .find_required_field(field_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Required field {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if let Some(name) = &req.name {
        let trimmed = name.trim().to_string();
        if trimmed.is_empty() {
            return Err(ApiError::Validation {
                message: "Field name cannot be empty".to_string(),
                field: Some("name".into()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if trimmed != field.name {
            // The field name is the join key into opportunity custom_fields;
            // values stored under the old name are orphaned by a rename.
            log::warn!(
                "Required field {} renamed from '{}' to '{}'; existing values keep the old key",
                field.id,
                field.name,
                trimmed
            );
        }
        field.name = trimmed;
    }
    if let Some(raw) = &req.field_type {
        field.field_type = parse_field_type(raw)?;
    }
    if let Some(options) = req.options {
        field.options = options;
    }
    if let Some(is_required) = req.is_required {
        field.is_required = is_required;
    }
    if field.field_type == FieldType::Select && field.options.is_empty() {
        return Err(ApiError::Validation {
            message: "Select fields need at least one option".to_string(),
            field: Some("options".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    repo.update_required_field(&field).await?;

    Ok(Json(RequiredFieldResponse { field }))
}

/// DELETE /api/v1/fields/:id
pub async fn delete_required_field(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let field_id = Uuid::parse_str(&id)?;

    let repo = StageRepository::new(state.pool.clone());
    repo.find_required_field(field_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Required field {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    repo.delete_required_field(field_id, Utc::now().timestamp())
        .await?;

    Ok(Json(DeleteResponse {
        deleted_id: field_id.to_string(),
    }))
}
