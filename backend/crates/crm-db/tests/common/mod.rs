use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

use crm_core::{FieldType, Funnel, Opportunity, RequiredField, Stage};

/// Creates an in-memory SQLite pool with migrations run
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

pub fn create_test_funnel() -> Funnel {
    Funnel::new("Sales".to_string(), 0)
}

pub fn create_test_stage(funnel_id: Uuid) -> Stage {
    Stage::new(funnel_id, "Lead".to_string(), "#2563eb".to_string(), 0)
}

pub fn create_test_opportunity(funnel_id: Uuid, stage_id: Uuid) -> Opportunity {
    Opportunity::new(
        funnel_id,
        stage_id,
        "New website".to_string(),
        "Acme Ltd".to_string(),
        12_000.0,
    )
}

pub fn create_test_required_field(stage_id: Uuid, name: &str) -> RequiredField {
    RequiredField::new(stage_id, name.to_string(), FieldType::Text, true)
}
