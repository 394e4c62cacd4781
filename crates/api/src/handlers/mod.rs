pub mod admin;
pub mod auth;
pub mod notifications;
pub mod rules;
pub mod sources;
pub mod triggers;

use triggerflow_core::error::CoreError;
use triggerflow_core::types::DbId;
use triggerflow_db::models::catalog::{CatalogKind, CatalogType};
use triggerflow_db::repositories::CatalogRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Resolve a catalog row referenced by a create/update request.
///
/// Unknown ids are a validation error (400).
pub(crate) async fn ensure_catalog_type(
    state: &AppState,
    kind: CatalogKind,
    id: DbId,
) -> AppResult<CatalogType> {
    CatalogRepo::find_by_id(&state.pool, kind, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "{} with id {id} does not exist",
                kind.entity()
            )))
        })
}
