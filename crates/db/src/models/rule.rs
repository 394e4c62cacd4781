//! Row shape of the rule materialization join.

use sqlx::FromRow;
use triggerflow_core::rule::RuleRow;
use triggerflow_core::types::DbId;

/// One flat row per (user, source, trigger, notification). The
/// notification columns are NULL when the owner has none active.
#[derive(Debug, Clone, FromRow)]
pub struct RuleJoinRow {
    pub user_id: DbId,
    pub source_id: DbId,
    pub trigger_id: DbId,
    pub trigger_type: String,
    pub trigger_params: serde_json::Value,
    pub notification_id: Option<DbId>,
}

impl From<RuleJoinRow> for RuleRow {
    fn from(row: RuleJoinRow) -> Self {
        RuleRow {
            user_id: row.user_id,
            source_id: row.source_id,
            trigger_id: row.trigger_id,
            trigger_type: row.trigger_type,
            trigger_params: row.trigger_params,
            notification_id: row.notification_id,
        }
    }
}
