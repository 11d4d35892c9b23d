use crate::Result;
use crate::repositories::{parse_optional_timestamp, parse_timestamp, parse_uuid};

use std::str::FromStr;

use crm_core::{WebhookConfig, WebhookEvent, WebhookTarget};
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

pub struct WebhookConfigRepository {
    pool: SqlitePool,
}

impl WebhookConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, config: &WebhookConfig) -> Result<()> {
        sqlx::query(
            r#"
              INSERT INTO crm_webhook_configs (
                  id, target_type, target_id, url, event,
                  created_at, updated_at, deleted_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
              "#,
        )
        .bind(config.id.to_string())
        .bind(config.target_type.as_str())
        .bind(config.target_id.to_string())
        .bind(&config.url)
        .bind(config.event.as_str())
        .bind(config.created_at.timestamp())
        .bind(config.updated_at.timestamp())
        .bind(config.deleted_at.map(|dt| dt.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookConfig>> {
        let row = sqlx::query(
            r#"
              SELECT id, target_type, target_id, url, event,
                     created_at, updated_at, deleted_at
              FROM crm_webhook_configs
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_config(&r)).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<WebhookConfig>> {
        let rows = sqlx::query(
            r#"
              SELECT id, target_type, target_id, url, event,
                     created_at, updated_at, deleted_at
              FROM crm_webhook_configs
              WHERE deleted_at IS NULL
              ORDER BY created_at ASC
              "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_config).collect()
    }

    /// Configs subscribed to `event` on this target instance. A config whose
    /// target_id is the nil UUID subscribes to every instance of the type.
    pub async fn find_matching(
        &self,
        target_type: WebhookTarget,
        target_id: Uuid,
        event: WebhookEvent,
    ) -> Result<Vec<WebhookConfig>> {
        let rows = sqlx::query(
            r#"
              SELECT id, target_type, target_id, url, event,
                     created_at, updated_at, deleted_at
              FROM crm_webhook_configs
              WHERE target_type = ? AND (target_id = ? OR target_id = ?)
                AND event = ? AND deleted_at IS NULL
              ORDER BY created_at ASC
              "#,
        )
        .bind(target_type.as_str())
        .bind(target_id.to_string())
        .bind(Uuid::nil().to_string())
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_config).collect()
    }

    pub async fn delete(&self, id: Uuid, deleted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_webhook_configs
              SET deleted_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(deleted_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn map_config(row: &SqliteRow) -> Result<WebhookConfig> {
    Ok(WebhookConfig {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        target_type: WebhookTarget::from_str(&row.try_get::<String, _>("target_type")?)?,
        target_id: parse_uuid(&row.try_get::<String, _>("target_id")?)?,
        url: row.try_get("url")?,
        event: WebhookEvent::from_str(&row.try_get::<String, _>("event")?)?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        deleted_at: parse_optional_timestamp(row.try_get("deleted_at")?)?,
    })
}
