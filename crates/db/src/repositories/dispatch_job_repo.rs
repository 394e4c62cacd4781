//! Repository for the `dispatch_jobs` table.
//!
//! Delivery is at-least-once. A consumer claims a job with a lease and
//! acknowledges it only after the channel returned; if the consumer dies,
//! the lease expires and another consumer claims the job again.

use sqlx::PgPool;
use triggerflow_core::types::DbId;

use crate::models::dispatch_job::{status, DispatchJob, DispatchJobListQuery, NewDispatchJob};

const COLUMNS: &str = "\
    id, queue, routing_key, notification_id, notification_type, notification_config, \
    user_id, source_id, trigger_id, payload, status, attempts, \
    claimed_at, lease_expires_at, completed_at, last_error, created_at, updated_at";

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 50;

pub struct DispatchJobRepo;

impl DispatchJobRepo {
    pub async fn enqueue(pool: &PgPool, input: &NewDispatchJob) -> Result<DispatchJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO dispatch_jobs \
                (queue, routing_key, notification_id, notification_type, notification_config, \
                 user_id, source_id, trigger_id, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DispatchJob>(&query)
            .bind(&input.queue)
            .bind(&input.routing_key)
            .bind(input.notification_id)
            .bind(&input.notification_type)
            .bind(&input.notification_config)
            .bind(input.user_id)
            .bind(input.source_id)
            .bind(input.trigger_id)
            .bind(&input.payload)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest claimable job on `queue`.
    ///
    /// Claimable means pending, or claimed with an expired lease. Uses
    /// `SELECT FOR UPDATE SKIP LOCKED` so concurrent consumers never claim
    /// the same row.
    pub async fn claim_next(
        pool: &PgPool,
        queue: &str,
        lease_secs: f64,
    ) -> Result<Option<DispatchJob>, sqlx::Error> {
        let query = format!(
            "UPDATE dispatch_jobs \
             SET status = $2, attempts = attempts + 1, claimed_at = NOW(), \
                 lease_expires_at = NOW() + make_interval(secs => $3) \
             WHERE id = ( \
                 SELECT id FROM dispatch_jobs \
                 WHERE queue = $1 \
                   AND (status = $4 OR (status = $2 AND lease_expires_at < NOW())) \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DispatchJob>(&query)
            .bind(queue)
            .bind(status::CLAIMED)
            .bind(lease_secs)
            .bind(status::PENDING)
            .fetch_optional(pool)
            .await
    }

    /// Mark a claimed job done. Returns `false` if the job was not claimed
    /// (e.g. the lease expired and another consumer finished it).
    pub async fn ack(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE dispatch_jobs \
             SET status = $2, completed_at = NOW(), lease_expires_at = NULL \
             WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(status::DONE)
        .bind(status::CLAIMED)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a claimed job failed with the channel's error.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE dispatch_jobs \
             SET status = $2, last_error = $3, completed_at = NOW(), lease_expires_at = NULL \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(status::FAILED)
        .bind(error)
        .bind(status::CLAIMED)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DispatchJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM dispatch_jobs WHERE id = $1");
        sqlx::query_as::<_, DispatchJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs newest first, optionally filtered by queue and status.
    pub async fn list(
        pool: &PgPool,
        params: &DispatchJobListQuery,
    ) -> Result<Vec<DispatchJob>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM dispatch_jobs \
             WHERE ($1::TEXT IS NULL OR queue = $1) \
               AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, DispatchJob>(&query)
            .bind(&params.queue)
            .bind(&params.status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
