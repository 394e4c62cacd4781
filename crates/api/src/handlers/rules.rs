//! Read-only view of the materialized rule cache.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use triggerflow_core::rule::{Rule, RuleSet};
use triggerflow_core::types::{DbId, Timestamp};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub rules: Vec<Rule>,
    /// `None` until the first successful materialization.
    pub materialized_at: Option<Timestamp>,
}

impl RulesResponse {
    /// Copy the rules visible to `owner` (`None` = all) out of a snapshot.
    pub fn from_snapshot(set: &RuleSet, owner: Option<DbId>) -> Self {
        let rules = match owner {
            Some(user_id) => set.for_user(user_id).cloned().collect(),
            None => set.rules().to_vec(),
        };
        Self {
            rules,
            materialized_at: set.materialized_at(),
        }
    }
}

/// GET /api/v1/rules
///
/// Rules currently in service for the caller, as the engine sees them.
pub async fn list_rules(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<RulesResponse>>> {
    let snapshot = state.rules.snapshot().await;
    Ok(Json(DataResponse {
        data: RulesResponse::from_snapshot(&snapshot, user.owner_scope()),
    }))
}
