//! Repository for the `notifications` table.

use sqlx::PgPool;
use triggerflow_core::types::DbId;

use crate::models::notification::{
    CreateNotification, Notification, NotificationTargetRow, UpdateNotification,
};

const COLUMNS: &str = "id, user_id, notification_type_id, name, description, config, \
                       is_active, created_at, updated_at";

/// Owner-scoped CRUD for notifications, plus the dispatch-time lookup.
pub struct NotificationRepo;

impl NotificationRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateNotification,
    ) -> Result<Notification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications (user_id, notification_type_id, name, description, config, is_active)
             VALUES ($1, $2, $3, $4, COALESCE($5, '{{}}'::jsonb), COALESCE($6, true))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(input.notification_type_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.config)
            .bind(input.is_active)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
        owner: Option<DbId>,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications
             WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        owner: Option<DbId>,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications
             WHERE ($1::BIGINT IS NULL OR user_id = $1)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(owner)
            .fetch_all(pool)
            .await
    }

    /// Update a notification. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateNotification,
        owner: Option<DbId>,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let query = format!(
            "UPDATE notifications SET
                notification_type_id = COALESCE($3, notification_type_id),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                config = COALESCE($6, config),
                is_active = COALESCE($7, is_active)
             WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(owner)
            .bind(input.notification_type_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.config)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId, owner: Option<DbId>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE id = $1 AND ($2::BIGINT IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load a notification with its type name for routing. Returns inactive
    /// rows too; the caller decides whether to skip them.
    pub async fn find_target(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NotificationTargetRow>, sqlx::Error> {
        sqlx::query_as::<_, NotificationTargetRow>(
            "SELECT n.id, n.user_id, nt.name AS notification_type, n.config, n.is_active
             FROM notifications n
             JOIN notification_types nt ON nt.id = n.notification_type_id
             WHERE n.id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
