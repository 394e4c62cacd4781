//! Seams between the pipeline and its collaborators.
//!
//! The engine and materializer only see these traits; [`PgStore`]
//! implements all of them on top of the `triggerflow-db` repositories.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use triggerflow_core::queue::QueueName;
use triggerflow_core::rule::{RuleKey, RuleRow};
use triggerflow_core::types::DbId;
use triggerflow_db::models::dispatch_job::{DispatchJob, NewDispatchJob};
use triggerflow_db::repositories::{DispatchJobRepo, NotificationRepo, RuleRepo};
use triggerflow_db::DbPool;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to enqueue on '{queue}': {source}")]
    Enqueue {
        queue: QueueName,
        #[source]
        source: StoreError,
    },

    #[error("Queue operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Stored job has unknown queue '{0}'")]
    UnknownQueue(String),
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// What dispatch needs to know about one notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationTarget {
    pub id: DbId,
    pub user_id: DbId,
    pub notification_type: String,
    pub config: Value,
    pub is_active: bool,
}

/// One outbound job: deliver `payload` through one notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub queue: QueueName,
    pub rule: RuleKey,
    pub notification_id: DbId,
    pub notification_type: String,
    pub notification_config: Value,
    pub payload: Value,
}

/// A job leased to a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
    pub id: DbId,
    pub queue: QueueName,
    pub notification_id: DbId,
    pub notification_type: String,
    pub notification_config: Value,
    pub payload: Value,
    pub attempts: i32,
}

impl TryFrom<DispatchJob> for ClaimedJob {
    type Error = QueueError;

    fn try_from(job: DispatchJob) -> Result<Self, Self::Error> {
        let queue = job
            .queue
            .parse()
            .map_err(|_| QueueError::UnknownQueue(job.queue.clone()))?;
        Ok(Self {
            id: job.id,
            queue,
            notification_id: job.notification_id,
            notification_type: job.notification_type,
            notification_config: job.notification_config,
            payload: job.payload,
            attempts: job.attempts,
        })
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Bulk read of the rule join.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn load_rule_rows(&self) -> Result<Vec<RuleRow>, StoreError>;
}

/// Dispatch-time notification lookup.
#[async_trait]
pub trait NotificationDirectory: Send + Sync {
    async fn find_target(&self, id: DbId) -> Result<Option<NotificationTarget>, StoreError>;
}

/// At-least-once task queue with lease-based redelivery.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submit a job. Returns the job id.
    async fn enqueue(&self, request: &DispatchRequest) -> Result<DbId, QueueError>;

    /// Lease the next job on `queue` for `lease`.
    async fn claim(&self, queue: QueueName, lease: Duration)
        -> Result<Option<ClaimedJob>, QueueError>;

    /// Acknowledge a processed job.
    async fn ack(&self, job_id: DbId) -> Result<(), QueueError>;

    /// Record a failed delivery.
    async fn fail(&self, job_id: DbId, error: &str) -> Result<(), QueueError>;
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// Postgres implementation of every pipeline seam.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleSource for PgStore {
    async fn load_rule_rows(&self) -> Result<Vec<RuleRow>, StoreError> {
        let rows = RuleRepo::load_rule_rows(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl NotificationDirectory for PgStore {
    async fn find_target(&self, id: DbId) -> Result<Option<NotificationTarget>, StoreError> {
        let row = NotificationRepo::find_target(&self.pool, id).await?;
        Ok(row.map(|r| NotificationTarget {
            id: r.id,
            user_id: r.user_id,
            notification_type: r.notification_type,
            config: r.config,
            is_active: r.is_active,
        }))
    }
}

#[async_trait]
impl TaskQueue for PgStore {
    async fn enqueue(&self, request: &DispatchRequest) -> Result<DbId, QueueError> {
        let job = NewDispatchJob {
            queue: request.queue.as_str().to_string(),
            routing_key: request.queue.routing_key().to_string(),
            notification_id: request.notification_id,
            notification_type: request.notification_type.clone(),
            notification_config: request.notification_config.clone(),
            user_id: request.rule.user_id,
            source_id: request.rule.source_id,
            trigger_id: request.rule.trigger_id,
            payload: request.payload.clone(),
        };
        let row = DispatchJobRepo::enqueue(&self.pool, &job)
            .await
            .map_err(|e| QueueError::Enqueue {
                queue: request.queue,
                source: e.into(),
            })?;
        Ok(row.id)
    }

    async fn claim(
        &self,
        queue: QueueName,
        lease: Duration,
    ) -> Result<Option<ClaimedJob>, QueueError> {
        let job = DispatchJobRepo::claim_next(&self.pool, queue.as_str(), lease.as_secs_f64())
            .await
            .map_err(StoreError::from)?;
        job.map(ClaimedJob::try_from).transpose()
    }

    async fn ack(&self, job_id: DbId) -> Result<(), QueueError> {
        if !DispatchJobRepo::ack(&self.pool, job_id)
            .await
            .map_err(StoreError::from)?
        {
            tracing::warn!(job_id, "Ack ignored, job is no longer claimed");
        }
        Ok(())
    }

    async fn fail(&self, job_id: DbId, error: &str) -> Result<(), QueueError> {
        if !DispatchJobRepo::fail(&self.pool, job_id, error)
            .await
            .map_err(StoreError::from)?
        {
            tracing::warn!(job_id, "Fail ignored, job is no longer claimed");
        }
        Ok(())
    }
}
