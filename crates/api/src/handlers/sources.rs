//! Handlers for the `/sources` resource.
//!
//! `config.source_key` is sealed before it reaches the database and is never
//! returned in plaintext.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use triggerflow_core::error::CoreError;
use triggerflow_core::secrets::SOURCE_KEY_FIELD;
use triggerflow_core::types::DbId;
use triggerflow_db::models::catalog::{CatalogKind, CatalogType};
use triggerflow_db::models::source::{CreateSource, Source, UpdateSource};
use triggerflow_db::repositories::{CatalogRepo, SourceRepo};
use triggerflow_pipeline::EvaluationReport;

use crate::error::{AppError, AppResult};
use crate::handlers::ensure_catalog_type;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/sources
pub async fn list_sources(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Source>>>> {
    let sources = SourceRepo::list(&state.pool, user.owner_scope()).await?;
    Ok(Json(DataResponse { data: sources }))
}

/// POST /api/v1/sources
pub async fn create_source(
    State(state): State<AppState>,
    user: AuthUser,
    Json(mut input): Json<CreateSource>,
) -> AppResult<(StatusCode, Json<DataResponse<Source>>)> {
    ensure_catalog_type(&state, CatalogKind::Source, input.source_type_id).await?;

    let mut config = input.config.take().unwrap_or_else(|| Value::Object(Default::default()));
    seal_config(&state, &mut config)?;
    input.config = Some(config);

    let source = SourceRepo::create(&state.pool, user.user_id, &input).await?;
    tracing::info!(user_id = user.user_id, source_id = source.id, "Source created");

    state.refresh_rules().await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: source })))
}

/// GET /api/v1/sources/{id}
pub async fn get_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Source>>> {
    let source = SourceRepo::find_by_id(&state.pool, id, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: source }))
}

/// PUT /api/v1/sources/{id}
///
/// Partial update: only supplied fields change. A new `config` replaces the
/// old one. A plaintext `source_key` is sealed; one already sealed, as
/// returned by GET, is stored unchanged.
pub async fn update_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateSource>,
) -> AppResult<Json<DataResponse<Source>>> {
    if let Some(type_id) = input.source_type_id {
        ensure_catalog_type(&state, CatalogKind::Source, type_id).await?;
    }
    if let Some(config) = input.config.as_mut() {
        seal_config(&state, config)?;
    }

    let source = SourceRepo::update(&state.pool, id, &input, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;

    state.refresh_rules().await;
    Ok(Json(DataResponse { data: source }))
}

/// DELETE /api/v1/sources/{id}
pub async fn delete_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !SourceRepo::delete(&state.pool, id, user.owner_scope()).await? {
        return Err(not_found(id));
    }
    tracing::info!(user_id = user.user_id, source_id = id, "Source deleted");

    state.refresh_rules().await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sources/{id}/payloads
///
/// Evaluate `payload` against the cached rules of the source right away and
/// return the evaluation report. Matches are dispatched as usual.
pub async fn submit_payload(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(payload): Json<Value>,
) -> AppResult<Json<DataResponse<EvaluationReport>>> {
    if !payload.is_object() {
        return Err(AppError::BadRequest("Payload must be a JSON object".into()));
    }
    SourceRepo::find_by_id(&state.pool, id, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;

    let report = state.engine.process(id, &payload).await;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/sources/types
pub async fn list_source_types(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<CatalogType>>>> {
    let types = CatalogRepo::list(&state.pool, CatalogKind::Source).await?;
    Ok(Json(DataResponse { data: types }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Source",
        id,
    })
}

fn seal_config(state: &AppState, config: &mut Value) -> AppResult<()> {
    if !config.is_object() {
        return Err(AppError::Core(CoreError::Validation(
            "Source config must be a JSON object".into(),
        )));
    }
    if matches!(config.get(SOURCE_KEY_FIELD), None | Some(Value::Null)) {
        return Ok(());
    }
    let secrets = state.secrets.as_ref().ok_or_else(|| {
        AppError::Core(CoreError::Validation(format!(
            "'{SOURCE_KEY_FIELD}' cannot be stored: credential encryption is not configured"
        )))
    })?;
    secrets
        .seal(config)
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))
}
