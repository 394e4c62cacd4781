//! Route definitions for the `/admin` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require a superuser (enforced by handler extractors).
///
/// ```text
/// POST /rules/materialize -> materialize_rules
/// GET  /dispatch-jobs     -> list_dispatch_jobs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rules/materialize", post(admin::materialize_rules))
        .route("/dispatch-jobs", get(admin::list_dispatch_jobs))
}
