//! Refresh token model and DTOs.

use sqlx::FromRow;
use triggerflow_core::types::{DbId, Timestamp};

/// A row from the `refresh_tokens` table. Only the SHA-256 hash of the
/// opaque token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub revoked: bool,
    pub created_at: Timestamp,
}

pub struct CreateRefreshToken {
    pub user_id: DbId,
    pub token_hash: String,
    pub expires_at: Timestamp,
}
