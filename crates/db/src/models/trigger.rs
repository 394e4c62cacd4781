//! Trigger entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use triggerflow_core::types::{DbId, Timestamp};

/// A row from the `triggers` table.
///
/// A trigger without `source_id` applies to every active source of its owner.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Trigger {
    pub id: DbId,
    pub user_id: DbId,
    pub source_id: Option<DbId>,
    pub trigger_type_id: DbId,
    pub name: String,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTrigger {
    pub source_id: Option<DbId>,
    pub trigger_type_id: DbId,
    pub name: String,
    pub config: serde_json::Value,
    pub is_active: Option<bool>,
}

/// DTO for updating a trigger. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTrigger {
    pub source_id: Option<DbId>,
    pub trigger_type_id: Option<DbId>,
    pub name: Option<String>,
    pub config: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}
