//! Source entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use triggerflow_core::types::{DbId, Timestamp};

/// A row from the `sources` table.
///
/// `config.source_key`, when present, holds ciphertext.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Source {
    pub id: DbId,
    pub user_id: DbId,
    pub source_type_id: DbId,
    pub name: String,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a source. The owner comes from the authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSource {
    pub source_type_id: DbId,
    pub name: String,
    pub config: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

/// DTO for updating a source. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSource {
    pub source_type_id: Option<DbId>,
    pub name: Option<String>,
    pub config: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

/// Active source joined with its type name, as polled by ingestion.
#[derive(Debug, Clone, FromRow)]
pub struct ActiveSource {
    pub id: DbId,
    pub user_id: DbId,
    pub source_type: String,
    pub name: String,
    pub config: serde_json::Value,
}
