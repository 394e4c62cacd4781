//! Notification entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use triggerflow_core::types::{DbId, Timestamp};

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub notification_type_id: DbId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotification {
    pub notification_type_id: DbId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

/// DTO for updating a notification. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNotification {
    pub notification_type_id: Option<DbId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

/// Notification joined with its type name; what dispatch needs to route it.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationTargetRow {
    pub id: DbId,
    pub user_id: DbId,
    pub notification_type: String,
    pub config: serde_json::Value,
    pub is_active: bool,
}
