//! Route definitions for the `/sources` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sources;
use crate::state::AppState;

/// Routes mounted at `/sources`.
///
/// ```text
/// GET    /                -> list_sources
/// POST   /                -> create_source
/// GET    /types           -> list_source_types
/// GET    /{id}            -> get_source
/// PUT    /{id}            -> update_source
/// DELETE /{id}            -> delete_source
/// POST   /{id}/payloads   -> submit_payload
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sources::list_sources).post(sources::create_source))
        .route("/types", get(sources::list_source_types))
        .route(
            "/{id}",
            get(sources::get_source)
                .put(sources::update_source)
                .delete(sources::delete_source),
        )
        .route("/{id}/payloads", post(sources::submit_payload))
}
