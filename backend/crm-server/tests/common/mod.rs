#![allow(dead_code)]

//! Test infrastructure for crm-server API tests

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

use crm_core::{FieldType, Funnel, Opportunity, RequiredField, Stage};
use crm_db::{FunnelRepository, OpportunityRepository, StageRepository};
use crm_server::AppState;
use crm_webhooks::WebhookDispatcher;

/// Create a test pool with in-memory SQLite
pub async fn create_test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);

    // In-memory databases need a single connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create test pool");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .expect("Failed to enable foreign keys");

    crm_db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Create AppState for testing
pub async fn create_test_state() -> AppState {
    let pool = create_test_pool().await;
    let dispatcher = Arc::new(
        WebhookDispatcher::new(pool.clone(), Duration::from_secs(2))
            .expect("Failed to build dispatcher"),
    );

    AppState::new(pool, dispatcher, Duration::from_secs(5))
}

pub async fn seed_funnel(pool: &SqlitePool) -> Funnel {
    let funnel = Funnel::new("Sales".to_string(), 0);
    FunnelRepository::new(pool.clone())
        .create(&funnel)
        .await
        .expect("Failed to create funnel");
    funnel
}

pub async fn seed_stage(pool: &SqlitePool, funnel_id: Uuid, name: &str, position: i32) -> Stage {
    let stage = Stage::new(funnel_id, name.to_string(), "#2563eb".to_string(), position);
    StageRepository::new(pool.clone())
        .create(&stage)
        .await
        .expect("Failed to create stage");
    stage
}

pub async fn seed_stage_with(pool: &SqlitePool, stage: &Stage) {
    StageRepository::new(pool.clone())
        .create(stage)
        .await
        .expect("Failed to create stage");
}

pub async fn seed_opportunity(pool: &SqlitePool, funnel_id: Uuid, stage_id: Uuid) -> Opportunity {
    let opportunity = Opportunity::new(
        funnel_id,
        stage_id,
        "New website".to_string(),
        "Acme Ltd".to_string(),
        12_000.0,
    );
    OpportunityRepository::new(pool.clone())
        .create(&opportunity)
        .await
        .expect("Failed to create opportunity")
}

pub fn required_field(stage_id: Uuid, name: &str) -> RequiredField {
    RequiredField::new(stage_id, name.to_string(), FieldType::Text, true)
}
