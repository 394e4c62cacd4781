//! Repository for the `triggers` table.

use sqlx::PgPool;
use triggerflow_core::types::DbId;

use crate::models::trigger::{CreateTrigger, Trigger, UpdateTrigger};

const COLUMNS: &str =
    "id, user_id, source_id, trigger_type_id, name, config, is_active, created_at, updated_at";

/// Owner-scoped CRUD for triggers.
pub struct TriggerRepo;

impl TriggerRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateTrigger,
    ) -> Result<Trigger, sqlx::Error> {
        let query = format!(
            "INSERT INTO triggers (user_id, source_id, trigger_type_id, name, config, is_active)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, true))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Trigger>(&query)
            .bind(user_id)
            .bind(input.source_id)
            .bind(input.trigger_type_id)
            .bind(&input.name)
            .bind(&input.config)
            .bind(input.is_active)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
        owner: Option<DbId>,
    ) -> Result<Option<Trigger>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM triggers
             WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)"
        );
        sqlx::query_as::<_, Trigger>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, owner: Option<DbId>) -> Result<Vec<Trigger>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM triggers
             WHERE ($1::BIGINT IS NULL OR user_id = $1)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Trigger>(&query)
            .bind(owner)
            .fetch_all(pool)
            .await
    }

    /// Update a trigger. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTrigger,
        owner: Option<DbId>,
    ) -> Result<Option<Trigger>, sqlx::Error> {
        let query = format!(
            "UPDATE triggers SET
                source_id = COALESCE($3, source_id),
                trigger_type_id = COALESCE($4, trigger_type_id),
                name = COALESCE($5, name),
                config = COALESCE($6, config),
                is_active = COALESCE($7, is_active)
             WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Trigger>(&query)
            .bind(id)
            .bind(owner)
            .bind(input.source_id)
            .bind(input.trigger_type_id)
            .bind(&input.name)
            .bind(&input.config)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId, owner: Option<DbId>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM triggers WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
