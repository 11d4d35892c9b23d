use crate::Result;
use crate::repositories::{parse_optional_timestamp, parse_timestamp, parse_uuid};

use chrono::Utc;
use crm_core::Funnel;
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

pub struct FunnelRepository {
    pool: SqlitePool,
}

impl FunnelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, funnel: &Funnel) -> Result<()> {
        sqlx::query(
            r#"
              INSERT INTO crm_funnels (id, name, position, created_at, updated_at, deleted_at)
              VALUES (?, ?, ?, ?, ?, ?)
              "#,
        )
        .bind(funnel.id.to_string())
        .bind(&funnel.name)
        .bind(funnel.position)
        .bind(funnel.created_at.timestamp())
        .bind(funnel.updated_at.timestamp())
        .bind(funnel.deleted_at.map(|dt| dt.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Funnel>> {
        let row = sqlx::query(
            r#"
              SELECT id, name, position, created_at, updated_at, deleted_at
              FROM crm_funnels
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_funnel(&r)).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<Funnel>> {
        let rows = sqlx::query(
            r#"
              SELECT id, name, position, created_at, updated_at, deleted_at
              FROM crm_funnels
              WHERE deleted_at IS NULL
              ORDER BY position ASC
              "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_funnel).collect()
    }

    pub async fn update(&self, funnel: &Funnel) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_funnels
              SET name = ?, position = ?, updated_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(&funnel.name)
        .bind(funnel.position)
        .bind(Utc::now().timestamp())
        .bind(funnel.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: Uuid, deleted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_funnels
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

fn map_funnel(row: &SqliteRow) -> Result<Funnel> {
    Ok(Funnel {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        position: row.try_get("position")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        deleted_at: parse_optional_timestamp(row.try_get("deleted_at")?)?,
    })
}
