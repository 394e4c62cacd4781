//! Repository for the `sources` table.

use sqlx::PgPool;
use triggerflow_core::types::DbId;

use crate::models::source::{ActiveSource, CreateSource, Source, UpdateSource};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, user_id, source_type_id, name, config, is_active, created_at, updated_at";

/// Owner-scoped CRUD for sources.
pub struct SourceRepo;

impl SourceRepo {
    /// Insert a source for `user_id`. The caller seals `config.source_key`
    /// before calling.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateSource,
    ) -> Result<Source, sqlx::Error> {
        let query = format!(
            "INSERT INTO sources (user_id, source_type_id, name, config, is_active)
             VALUES ($1, $2, $3, COALESCE($4, '{{}}'::jsonb), COALESCE($5, true))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Source>(&query)
            .bind(user_id)
            .bind(input.source_type_id)
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
    ) -> Result<Option<Source>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sources
             WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)"
        );
        sqlx::query_as::<_, Source>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// List sources, newest first.
    pub async fn list(pool: &PgPool, owner: Option<DbId>) -> Result<Vec<Source>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sources
             WHERE ($1::BIGINT IS NULL OR user_id = $1)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Source>(&query)
            .bind(owner)
            .fetch_all(pool)
            .await
    }

    /// Active sources of the given type whose owner is also active.
    pub async fn list_active_by_type(
        pool: &PgPool,
        source_type: &str,
    ) -> Result<Vec<ActiveSource>, sqlx::Error> {
        sqlx::query_as::<_, ActiveSource>(
            "SELECT s.id, s.user_id, st.name AS source_type, s.name, s.config
             FROM sources s
             JOIN source_types st ON st.id = s.source_type_id
             JOIN users u ON u.id = s.user_id AND u.is_active
             WHERE s.is_active AND st.name = $1
             ORDER BY s.id",
        )
        .bind(source_type)
        .fetch_all(pool)
        .await
    }

    /// Update a source. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if the row does not exist or is not owned by `owner`.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSource,
        owner: Option<DbId>,
    ) -> Result<Option<Source>, sqlx::Error> {
        let query = format!(
            "UPDATE sources SET
                source_type_id = COALESCE($3, source_type_id),
                name = COALESCE($4, name),
                config = COALESCE($5, config),
                is_active = COALESCE($6, is_active)
             WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Source>(&query)
            .bind(id)
            .bind(owner)
            .bind(input.source_type_id)
            .bind(&input.name)
            .bind(&input.config)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Hard-delete a source. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId, owner: Option<DbId>) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM sources WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)")
                .bind(id)
                .bind(owner)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
