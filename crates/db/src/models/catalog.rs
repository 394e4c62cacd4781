//! Type catalog rows (`source_types`, `trigger_types`, `notification_types`).

use serde::Serialize;
use sqlx::FromRow;
use triggerflow_core::types::{DbId, Timestamp};

/// The three catalog tables share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Source,
    Trigger,
    Notification,
}

impl CatalogKind {
    pub fn table(self) -> &'static str {
        match self {
            CatalogKind::Source => "source_types",
            CatalogKind::Trigger => "trigger_types",
            CatalogKind::Notification => "notification_types",
        }
    }

    /// Entity name used in not-found errors.
    pub fn entity(self) -> &'static str {
        match self {
            CatalogKind::Source => "SourceType",
            CatalogKind::Trigger => "TriggerType",
            CatalogKind::Notification => "NotificationType",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CatalogType {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub config: serde_json::Value,
    pub created_at: Timestamp,
}
