//! Route definitions for the `/triggers` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::triggers;
use crate::state::AppState;

/// Routes mounted at `/triggers`.
///
/// ```text
/// GET    /        -> list_triggers
/// POST   /        -> create_trigger
/// GET    /types   -> list_trigger_types (public)
/// GET    /{id}    -> get_trigger
/// PUT    /{id}    -> update_trigger
/// DELETE /{id}    -> delete_trigger
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(triggers::list_triggers).post(triggers::create_trigger),
        )
        .route("/types", get(triggers::list_trigger_types))
        .route(
            "/{id}",
            get(triggers::get_trigger)
                .put(triggers::update_trigger)
                .delete(triggers::delete_trigger),
        )
}
