use crate::Result;
use crate::repositories::{
    encode_string_map, parse_optional_timestamp, parse_string_map, parse_timestamp, parse_uuid,
};

use std::collections::HashMap;

use chrono::Utc;
use crm_core::Opportunity;
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

pub struct OpportunityRepository {
    pool: SqlitePool,
}

impl OpportunityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts the opportunity at the end of its stage lane.
    pub async fn create(&self, opportunity: &Opportunity) -> Result<Opportunity> {
        let position = self.next_position(opportunity.stage_id).await?;

        sqlx::query(
            r#"
              INSERT INTO crm_opportunities (
                  id, funnel_id, stage_id, position, title, client, value,
                  company, phone, email, custom_fields, win_reason, loss_reason,
                  last_stage_change_at, created_at, updated_at, deleted_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              "#,
        )
        .bind(opportunity.id.to_string())
        .bind(opportunity.funnel_id.to_string())
        .bind(opportunity.stage_id.to_string())
        .bind(position)
        .bind(&opportunity.title)
        .bind(&opportunity.client)
        .bind(opportunity.value)
        .bind(&opportunity.company)
        .bind(&opportunity.phone)
        .bind(&opportunity.email)
        .bind(encode_string_map(&opportunity.custom_fields))
        .bind(&opportunity.win_reason)
        .bind(&opportunity.loss_reason)
        .bind(opportunity.last_stage_change_at.map(|dt| dt.timestamp()))
        .bind(opportunity.created_at.timestamp())
        .bind(opportunity.updated_at.timestamp())
        .bind(opportunity.deleted_at.map(|dt| dt.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(Opportunity {
            position,
            ..opportunity.clone()
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Opportunity>> {
        let row = sqlx::query(
            r#"
              SELECT id, funnel_id, stage_id, position, title, client, value,
                     company, phone, email, custom_fields, win_reason, loss_reason,
                     last_stage_change_at, created_at, updated_at, deleted_at
              FROM crm_opportunities
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_opportunity(&r)).transpose()
    }

    pub async fn find_by_funnel(&self, funnel_id: Uuid) -> Result<Vec<Opportunity>> {
        let rows = sqlx::query(
            r#"
              SELECT id, funnel_id, stage_id, position, title, client, value,
                     company, phone, email, custom_fields, win_reason, loss_reason,
                     last_stage_change_at, created_at, updated_at, deleted_at
              FROM crm_opportunities
              WHERE funnel_id = ? AND deleted_at IS NULL
              ORDER BY stage_id ASC, position ASC
              "#,
        )
        .bind(funnel_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_opportunity).collect()
    }

    pub async fn find_by_stage(&self, stage_id: Uuid) -> Result<Vec<Opportunity>> {
        let rows = sqlx::query(
            r#"
              SELECT id, funnel_id, stage_id, position, title, client, value,
                     company, phone, email, custom_fields, win_reason, loss_reason,
                     last_stage_change_at, created_at, updated_at, deleted_at
              FROM crm_opportunities
              WHERE stage_id = ? AND deleted_at IS NULL
              ORDER BY position ASC
              "#,
        )
        .bind(stage_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_opportunity).collect()
    }

    /// Updates the descriptive fields; stage, position, custom fields and
    /// reasons have their own dedicated updates.
    pub async fn update(&self, opportunity: &Opportunity) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_opportunities
              SET title = ?, client = ?, value = ?, company = ?, phone = ?, email = ?,
                  updated_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(&opportunity.title)
        .bind(&opportunity.client)
        .bind(opportunity.value)
        .bind(&opportunity.company)
        .bind(&opportunity.phone)
        .bind(&opportunity.email)
        .bind(Utc::now().timestamp())
        .bind(opportunity.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Moves the opportunity to `stage_id` at `position`, renumbering
    /// both lanes and stamping the stage-change timestamp. The whole move
    /// runs in one transaction.
    pub async fn update_stage(
        &self,
        id: Uuid,
        stage_id: Uuid,
        position: i32,
    ) -> Result<Option<Opportunity>> {
        let Some(current) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        // Close the gap left behind in the source lane.
        sqlx::query(
            r#"
              UPDATE crm_opportunities
              SET position = position - 1
              WHERE stage_id = ? AND position > ? AND deleted_at IS NULL
              "#,
        )
        .bind(current.stage_id.to_string())
        .bind(current.position)
        .execute(&mut *tx)
        .await?;

        // Open a slot in the destination lane.
        sqlx::query(
            r#"
              UPDATE crm_opportunities
              SET position = position + 1
              WHERE stage_id = ? AND position >= ? AND id != ? AND deleted_at IS NULL
              "#,
        )
        .bind(stage_id.to_string())
        .bind(position)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
              UPDATE crm_opportunities
              SET stage_id = ?, position = ?, last_stage_change_at = ?, updated_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(stage_id.to_string())
        .bind(position)
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_id(id).await
    }

    /// Merges `values` into the opportunity's custom-field map. Existing
    /// keys not named in `values` are preserved.
    pub async fn update_custom_fields(
        &self,
        id: Uuid,
        values: &HashMap<String, String>,
    ) -> Result<Option<Opportunity>> {
        let Some(mut current) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        for (name, value) in values {
            current.custom_fields.insert(name.clone(), value.clone());
        }

        sqlx::query(
            r#"
              UPDATE crm_opportunities
              SET custom_fields = ?, updated_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(encode_string_map(&current.custom_fields))
        .bind(Utc::now().timestamp())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await
    }

    pub async fn update_reasons(
        &self,
        id: Uuid,
        win_reason: Option<&str>,
        loss_reason: Option<&str>,
    ) -> Result<Option<Opportunity>> {
        sqlx::query(
            r#"
              UPDATE crm_opportunities
              SET win_reason = COALESCE(?, win_reason),
                  loss_reason = COALESCE(?, loss_reason),
                  updated_at = ?
              WHERE id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(win_reason)
        .bind(loss_reason)
        .bind(Utc::now().timestamp())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await
    }

    /// Copies `source` into another funnel's stage as a brand-new
    /// opportunity appended to the destination lane.
    pub async fn clone_into_stage(
        &self,
        source: &Opportunity,
        funnel_id: Uuid,
        stage_id: Uuid,
    ) -> Result<Opportunity> {
        let now = Utc::now();
        let clone = Opportunity {
            id: Uuid::new_v4(),
            funnel_id,
            stage_id,
            position: 0,
            win_reason: None,
            loss_reason: None,
            last_stage_change_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            ..source.clone()
        };
        self.create(&clone).await
    }

    pub async fn archive(&self, id: Uuid, deleted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
              UPDATE crm_opportunities
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

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM crm_opportunities WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn next_position(&self, stage_id: Uuid) -> Result<i32> {
        let row = sqlx::query(
            r#"
              SELECT COUNT(*) AS lane_size
              FROM crm_opportunities
              WHERE stage_id = ? AND deleted_at IS NULL
              "#,
        )
        .bind(stage_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i64, _>("lane_size")? as i32)
    }
}

fn map_opportunity(row: &SqliteRow) -> Result<Opportunity> {
    Ok(Opportunity {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        funnel_id: parse_uuid(&row.try_get::<String, _>("funnel_id")?)?,
        stage_id: parse_uuid(&row.try_get::<String, _>("stage_id")?)?,
        position: row.try_get("position")?,
        title: row.try_get("title")?,
        client: row.try_get("client")?,
        value: row.try_get("value")?,
        company: row.try_get("company")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        custom_fields: parse_string_map(&row.try_get::<String, _>("custom_fields")?)?,
        win_reason: row.try_get("win_reason")?,
        loss_reason: row.try_get("loss_reason")?,
        last_stage_change_at: parse_optional_timestamp(row.try_get("last_stage_change_at")?)?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        deleted_at: parse_optional_timestamp(row.try_get("deleted_at")?)?,
    })
}
