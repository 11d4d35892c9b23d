//! Webhook REST API handlers
//!
//! Outbound subscriptions plus the inbound intake endpoint external systems
//! post to. Inbound creation bypasses the transition engine entirely; there
//! is no gating on the way in, only on moves between stages.

use crate::api::DeleteResponse;
use crate::api::error::{ApiError, Result as ApiResult};
use crate::app_state::AppState;

use crm_core::{Opportunity, WebhookConfig, WebhookEvent, WebhookTarget};
use crm_db::{OpportunityRepository, StageRepository, WebhookConfigRepository};
use crm_engine::WebhookSink;

use std::collections::HashMap;
use std::panic::Location;
use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub target_type: String,
    pub target_id: String,
    pub url: String,
    pub event: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub webhook: WebhookConfig,
}

#[derive(Debug, Serialize)]
pub struct WebhookListResponse {
    pub webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Serialize)]
pub struct TestWebhookResponse {
    pub delivered: bool,
}

#[derive(Debug, Deserialize)]
pub struct InboundOpportunityRequest {
    pub funnel_id: String,
    pub stage_id: String,
    pub title: String,
    #[serde(default)]
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

#[derive(Debug, Serialize)]
pub struct InboundOpportunityResponse {
    pub opportunity: Opportunity,
}

/// GET /api/v1/webhooks
pub async fn list_webhooks(State(state): State<AppState>) -> ApiResult<Json<WebhookListResponse>> {
    let repo = WebhookConfigRepository::new(state.pool.clone());
    let webhooks = repo.find_all().await?;

    Ok(Json(WebhookListResponse { webhooks }))
}

/// POST /api/v1/webhooks
pub async fn create_webhook(
    State(state): State<AppState>,
    Json(req): Json<CreateWebhookRequest>,
) -> ApiResult<Json<WebhookResponse>> {
    let target_type = WebhookTarget::from_str(&req.target_type).map_err(|_| {
        ApiError::Validation {
            message: format!("Unknown webhook target '{}'", req.target_type),
            field: Some("target_type".into()),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;
    let event = WebhookEvent::from_str(&req.event).map_err(|_| ApiError::Validation {
        message: format!("Unknown webhook event '{}'", req.event),
        field: Some("event".into()),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let target_id = Uuid::parse_str(&req.target_id)?;

    let url = req.url.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ApiError::Validation {
            message: "Webhook URL must be http or https".to_string(),
            field: Some("url".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let webhook = WebhookConfig::new(target_type, target_id, url, event);
    let repo = WebhookConfigRepository::new(state.pool.clone());
    repo.create(&webhook).await?;

    log::info!(
        "Subscribed {} to {}.{} for {}",
        webhook.url,
        webhook.target_type.as_str(),
        webhook.event.as_str(),
        webhook.target_id
    );

    Ok(Json(WebhookResponse { webhook }))
}

/// DELETE /api/v1/webhooks/:id
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let webhook_id = Uuid::parse_str(&id)?;

    let repo = WebhookConfigRepository::new(state.pool.clone());
    repo.find_by_id(webhook_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Webhook {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    repo.delete(webhook_id, Utc::now().timestamp()).await?;

    Ok(Json(DeleteResponse {
        deleted_id: webhook_id.to_string(),
    }))
}

/// POST /api/v1/webhooks/:id/test
///
/// Fires a sample payload at the subscribed endpoint so a user can verify
/// it is reachable before relying on it.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TestWebhookResponse>> {
    let webhook_id = Uuid::parse_str(&id)?;

    let repo = WebhookConfigRepository::new(state.pool.clone());
    let webhook = repo
        .find_by_id(webhook_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Webhook {} not found", id),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let payload = json!({
        "test": true,
        "target_id": webhook.target_id,
        "timestamp": Utc::now().to_rfc3339(),
    });
    let delivered = state
        .dispatcher
        .send_once(&webhook.url, webhook.target_type, webhook.event, payload)
        .await;

    Ok(Json(TestWebhookResponse { delivered }))
}

/// POST /api/v1/webhooks/inbound
pub async fn inbound_opportunity(
    State(state): State<AppState>,
    Json(req): Json<InboundOpportunityRequest>,
) -> ApiResult<Json<InboundOpportunityResponse>> {
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

    let stage = StageRepository::new(state.pool.clone())
        .find_by_id(stage_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: format!("Stage {} not found", stage_id),
            location: ErrorLocation::from(Location::caller()),
        })?;
    if stage.funnel_id != funnel_id {
        return Err(ApiError::Validation {
            message: format!("Stage {} is not part of funnel {}", stage_id, funnel_id),
            field: Some("stage_id".into()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

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
        "Inbound webhook created opportunity {} ({})",
        opportunity.id,
        opportunity.title
    );

    Ok(Json(InboundOpportunityResponse { opportunity }))
}
