//! Dispatch job model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use triggerflow_core::types::{DbId, Timestamp};

/// Job status values stored in `dispatch_jobs.status`.
pub mod status {
    pub const PENDING: &str = "pending";
    pub const CLAIMED: &str = "claimed";
    pub const DONE: &str = "done";
    pub const FAILED: &str = "failed";
}

/// A row from the `dispatch_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DispatchJob {
    pub id: DbId,
    pub queue: String,
    pub routing_key: String,
    pub notification_id: DbId,
    pub notification_type: String,
    pub notification_config: serde_json::Value,
    pub user_id: DbId,
    pub source_id: DbId,
    pub trigger_id: DbId,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub claimed_at: Option<Timestamp>,
    pub lease_expires_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for enqueueing a job.
#[derive(Debug, Clone)]
pub struct NewDispatchJob {
    pub queue: String,
    pub routing_key: String,
    pub notification_id: DbId,
    pub notification_type: String,
    pub notification_config: serde_json::Value,
    pub user_id: DbId,
    pub source_id: DbId,
    pub trigger_id: DbId,
    pub payload: serde_json::Value,
}

/// Query parameters for `GET /api/v1/admin/dispatch-jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchJobListQuery {
    pub queue: Option<String>,
    pub status: Option<String>,
    /// Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
