use crate::Result;
use crate::repositories::{
    encode_string_list, parse_optional_timestamp, parse_string_list, parse_timestamp, parse_uuid,
};

use std::str::FromStr;

use chrono::Utc;
use crm_core::{FieldType, MigrateTarget, RequiredField, Stage};
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

pub struct StageRepository {
    pool: SqlitePool,
}

impl StageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, stage: &Stage) -> Result<()> {
        sqlx::query(
            r#"
              INSERT INTO crm_stages (
                  id, funnel_id, name, color, position,
                  is_win_stage, is_loss_stage, win_reason_required, loss_reason_required,
                  win_reasons, loss_reasons, alert_after_days,
                  migrate_funnel_id, migrate_stage_id,
                  created_at, updated_at, deleted_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              "#,
        )
        .bind(stage.id.to_string())
        .bind(stage.funnel_id.to_string())
        .bind(&stage.name)
        .bind(&stage.color)
        .bind(stage.position)
        .bind(stage.is_win_stage)
        .bind(stage.is_loss_stage)
        .bind(stage.win_reason_required)
        .bind(stage.loss_reason_required)
        .bind(encode_string_list(&stage.win_reasons))
        .bind(encode_string_list(&stage.loss_reasons))
        .bind(stage.alert_after_days)
        .bind(stage.migrate_target.as_ref().map(|t| t.funnel_id.to_string()))
        .bind(stage.migrate_target.as_ref().map(|t| t.stage_id.to_string()))
        .bind(stage.created_at.timestamp())
        .bind(stage.updated_at.timestamp())
        .bind(stage.deleted_at.map(|dt| dt.timestamp()))
        .execute(&self.pool)
        .await?;

        for field in &stage.required_fields {
            self.add_required_field(field).await?;
        }

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Stage>> {
        let row = sqlx::query(
            r#"
              SELECT id, funnel_id, name, color, position,
                     is_win_stage, is_loss_stage, win_reason_required, loss_reason_required,
                     win_reasons, loss_reasons, alert_after_days,
                     migrate_funnel_id, migrate_stage_id,
                     created_at, updated_at, deleted_at
              FROM crm_stages
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut stage = map_stage(&row)?;
        stage.required_fields = self.find_required_fields(stage.id).await?;
        Ok(Some(stage))
    }

    pub async fn find_by_funnel(&self, funnel_id: Uuid) -> Result<Vec<Stage>> {
        let rows = sqlx::query(
            r#"
              SELECT id, funnel_id, name, color, position,
                     is_win_stage, is_loss_stage, win_reason_required, loss_reason_required,
                     win_reasons, loss_reasons, alert_after_days,
                     migrate_funnel_id, migrate_stage_id,
                     created_at, updated_at, deleted_at
              FROM crm_stages
              WHERE funnel_id = ? AND deleted_at IS NULL
              ORDER BY position ASC
              "#,
        )
        .bind(funnel_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut stages = rows
            .iter()
            .map(map_stage)
            .collect::<Result<Vec<Stage>>>()?;
        for stage in &mut stages {
            stage.required_fields = self.find_required_fields(stage.id).await?;
        }
        Ok(stages)
    }

    pub async fn update(&self, stage: &Stage) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_stages
              SET name = ?, color = ?, position = ?,
                  is_win_stage = ?, is_loss_stage = ?,
                  win_reason_required = ?, loss_reason_required = ?,
                  win_reasons = ?, loss_reasons = ?, alert_after_days = ?,
                  migrate_funnel_id = ?, migrate_stage_id = ?,
                  updated_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(&stage.name)
        .bind(&stage.color)
        .bind(stage.position)
        .bind(stage.is_win_stage)
        .bind(stage.is_loss_stage)
        .bind(stage.win_reason_required)
        .bind(stage.loss_reason_required)
        .bind(encode_string_list(&stage.win_reasons))
        .bind(encode_string_list(&stage.loss_reasons))
        .bind(stage.alert_after_days)
        .bind(stage.migrate_target.as_ref().map(|t| t.funnel_id.to_string()))
        .bind(stage.migrate_target.as_ref().map(|t| t.stage_id.to_string()))
        .bind(Utc::now().timestamp())
        .bind(stage.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: Uuid, deleted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_stages
              SET deleted_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(deleted_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
              UPDATE crm_required_fields
              SET deleted_at = ?
              WHERE stage_id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(deleted_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_required_field(&self, field: &RequiredField) -> Result<()> {
        sqlx::query(
            r#"
              INSERT INTO crm_required_fields (
                  id, stage_id, name, field_type, options, is_required,
                  created_at, updated_at, deleted_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
              "#,
        )
        .bind(field.id.to_string())
        .bind(field.stage_id.to_string())
        .bind(&field.name)
        .bind(field.field_type.as_str())
        .bind(encode_string_list(&field.options))
        .bind(field.is_required)
        .bind(field.created_at.timestamp())
        .bind(field.updated_at.timestamp())
        .bind(field.deleted_at.map(|dt| dt.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_required_field(&self, field: &RequiredField) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_required_fields
              SET name = ?, field_type = ?, options = ?, is_required = ?, updated_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(&field.name)
        .bind(field.field_type.as_str())
        .bind(encode_string_list(&field.options))
        .bind(field.is_required)
        .bind(Utc::now().timestamp())
        .bind(field.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_required_field(&self, id: Uuid, deleted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_required_fields
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

    pub async fn find_required_field(&self, id: Uuid) -> Result<Option<RequiredField>> {
        let row = sqlx::query(
            r#"
              SELECT id, stage_id, name, field_type, options, is_required,
                     created_at, updated_at, deleted_at
              FROM crm_required_fields
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_required_field).transpose()
    }

    pub async fn find_required_fields(&self, stage_id: Uuid) -> Result<Vec<RequiredField>> {
        let rows = sqlx::query(
            r#"
              SELECT id, stage_id, name, field_type, options, is_required,
                     created_at, updated_at, deleted_at
              FROM crm_required_fields
              WHERE stage_id = ? AND deleted_at IS NULL
              ORDER BY created_at ASC, name ASC
              "#,
        )
        .bind(stage_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_required_field).collect()
    }
}

fn map_stage(row: &SqliteRow) -> Result<Stage> {
    let migrate_funnel_id: Option<String> = row.try_get("migrate_funnel_id")?;
    let migrate_stage_id: Option<String> = row.try_get("migrate_stage_id")?;
    let migrate_target = match (migrate_funnel_id, migrate_stage_id) {
        (Some(funnel_id), Some(stage_id)) => Some(MigrateTarget {
            funnel_id: parse_uuid(&funnel_id)?,
            stage_id: parse_uuid(&stage_id)?,
        }),
        _ => None,
    };

    Ok(Stage {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        funnel_id: parse_uuid(&row.try_get::<String, _>("funnel_id")?)?,
        name: row.try_get("name")?,
        color: row.try_get("color")?,
        position: row.try_get("position")?,
        is_win_stage: row.try_get("is_win_stage")?,
        is_loss_stage: row.try_get("is_loss_stage")?,
        win_reason_required: row.try_get("win_reason_required")?,
        loss_reason_required: row.try_get("loss_reason_required")?,
        win_reasons: parse_string_list(&row.try_get::<String, _>("win_reasons")?)?,
        loss_reasons: parse_string_list(&row.try_get::<String, _>("loss_reasons")?)?,
        alert_after_days: row.try_get("alert_after_days")?,
        migrate_target,
        required_fields: Vec::new(),
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        deleted_at: parse_optional_timestamp(row.try_get("deleted_at")?)?,
    })
}

fn map_required_field(row: &SqliteRow) -> Result<RequiredField> {
    Ok(RequiredField {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        stage_id: parse_uuid(&row.try_get::<String, _>("stage_id")?)?,
        name: row.try_get("name")?,
        field_type: FieldType::from_str(&row.try_get::<String, _>("field_type")?)?,
        options: parse_string_list(&row.try_get::<String, _>("options")?)?,
        is_required: row.try_get("is_required")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        deleted_at: parse_optional_timestamp(row.try_get("deleted_at")?)?,
    })
}
