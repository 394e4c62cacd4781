//! Bulk read behind rule materialization.

use sqlx::PgPool;

use crate::models::rule::RuleJoinRow;

/// Joins active users, their active sources and active triggers, and left
/// joins their active notifications. A trigger bound to a source joins only
/// that source; an unbound trigger joins every active source of its owner.
/// Every join is keyed on the owner so rows never mix users.
const RULE_JOIN: &str = "\
    SELECT u.id AS user_id,
           s.id AS source_id,
           t.id AS trigger_id,
           tt.name AS trigger_type,
           t.config AS trigger_params,
           n.id AS notification_id
    FROM users u
    JOIN sources s
      ON s.user_id = u.id AND s.is_active
    JOIN triggers t
      ON t.user_id = u.id AND t.is_active
     AND (t.source_id IS NULL OR t.source_id = s.id)
    JOIN trigger_types tt
      ON tt.id = t.trigger_type_id
    LEFT JOIN notifications n
      ON n.user_id = u.id AND n.is_active
    WHERE u.is_active
    ORDER BY u.id, s.id, t.id, n.id";

pub struct RuleRepo;

impl RuleRepo {
    /// Flat join rows, one per notification (or one with a NULL
    /// notification when the owner has none active).
    pub async fn load_rule_rows(pool: &PgPool) -> Result<Vec<RuleJoinRow>, sqlx::Error> {
        sqlx::query_as::<_, RuleJoinRow>(RULE_JOIN).fetch_all(pool).await
    }
}
