//! Handlers for the `/triggers` resource.
//!
//! Trigger params are checked against the evaluator registered for the
//! trigger's type on every write, so the rule engine only ever sees configs
//! it can parse.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use triggerflow_core::error::CoreError;
use triggerflow_core::trigger::TriggerRegistry;
use triggerflow_core::types::DbId;
use triggerflow_db::models::catalog::{CatalogKind, CatalogType};
use triggerflow_db::models::trigger::{CreateTrigger, Trigger, UpdateTrigger};
use triggerflow_db::repositories::{CatalogRepo, SourceRepo, TriggerRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::ensure_catalog_type;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Catalog row joined with the registered evaluator's parameter schema.
#[derive(Debug, Serialize)]
pub struct TriggerTypeView {
    pub id: DbId,
    pub name: String,
    pub description: String,
    /// `None` when no evaluator is registered under this name.
    pub params: Option<Value>,
}

/// GET /api/v1/triggers
pub async fn list_triggers(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Trigger>>>> {
    let triggers = TriggerRepo::list(&state.pool, user.owner_scope()).await?;
    Ok(Json(DataResponse { data: triggers }))
}

/// POST /api/v1/triggers
pub async fn create_trigger(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateTrigger>,
) -> AppResult<(StatusCode, Json<DataResponse<Trigger>>)> {
    let trigger_type =
        ensure_catalog_type(&state, CatalogKind::Trigger, input.trigger_type_id).await?;
    state.triggers.validate(&trigger_type.name, &input.config)?;
    if let Some(source_id) = input.source_id {
        ensure_source_owned(&state, source_id, user.user_id).await?;
    }

    let trigger = TriggerRepo::create(&state.pool, user.user_id, &input).await?;
    tracing::info!(
        user_id = user.user_id,
        trigger_id = trigger.id,
        trigger_type = %trigger_type.name,
        "Trigger created"
    );

    state.refresh_rules().await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: trigger })))
}

/// GET /api/v1/triggers/{id}
pub async fn get_trigger(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Trigger>>> {
    let trigger = TriggerRepo::find_by_id(&state.pool, id, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: trigger }))
}

/// PUT /api/v1/triggers/{id}
///
/// Partial update. When the type or params change, the resulting
/// combination is validated as a whole.
pub async fn update_trigger(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateTrigger>,
) -> AppResult<Json<DataResponse<Trigger>>> {
    let existing = TriggerRepo::find_by_id(&state.pool, id, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;

    if input.trigger_type_id.is_some() || input.config.is_some() {
        let type_id = input.trigger_type_id.unwrap_or(existing.trigger_type_id);
        let trigger_type = ensure_catalog_type(&state, CatalogKind::Trigger, type_id).await?;
        let config = input.config.as_ref().unwrap_or(&existing.config);
        state.triggers.validate(&trigger_type.name, config)?;
    }
    if let Some(source_id) = input.source_id {
        ensure_source_owned(&state, source_id, existing.user_id).await?;
    }

    let trigger = TriggerRepo::update(&state.pool, id, &input, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;

    state.refresh_rules().await;
    Ok(Json(DataResponse { data: trigger }))
}

/// DELETE /api/v1/triggers/{id}
pub async fn delete_trigger(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !TriggerRepo::delete(&state.pool, id, user.owner_scope()).await? {
        return Err(not_found(id));
    }
    tracing::info!(user_id = user.user_id, trigger_id = id, "Trigger deleted");

    state.refresh_rules().await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/triggers/types (public)
pub async fn list_trigger_types(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<TriggerTypeView>>>> {
    let catalog = CatalogRepo::list(&state.pool, CatalogKind::Trigger).await?;
    Ok(Json(DataResponse {
        data: describe_trigger_types(catalog, &state.triggers),
    }))
}

pub fn describe_trigger_types(
    catalog: Vec<CatalogType>,
    registry: &TriggerRegistry,
) -> Vec<TriggerTypeView> {
    let mut described: HashMap<String, Value> = registry
        .describe_all()
        .into_iter()
        .map(|d| (d.name, d.params))
        .collect();

    catalog
        .into_iter()
        .map(|row| TriggerTypeView {
            params: described.remove(&row.name),
            id: row.id,
            name: row.name,
            description: row.description,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Trigger",
        id,
    })
}

/// A trigger may only be bound to a source of the same owner.
async fn ensure_source_owned(state: &AppState, source_id: DbId, owner: DbId) -> AppResult<()> {
    SourceRepo::find_by_id(&state.pool, source_id, Some(owner))
        .await?
        .map(|_| ())
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Source with id {source_id} does not exist"
            )))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn row(id: DbId, name: &str) -> CatalogType {
        CatalogType {
            id,
            name: name.to_string(),
            description: format!("{name} trigger"),
            config: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn catalog_rows_are_joined_with_registry() {
        let views = describe_trigger_types(
            vec![row(1, "temperature"), row(2, "rainfall")],
            &TriggerRegistry::builtin(),
        );

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, 1);
        let params = views[0].params.as_ref().unwrap();
        assert!(params.get("temp").is_some());
        assert!(params.get("op").is_some());
        assert_eq!(views[1].name, "rainfall");
        assert!(views[1].params.is_none());
    }
}
