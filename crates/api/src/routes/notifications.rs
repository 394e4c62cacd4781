//! Route definitions for the `/notifications` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// GET    /        -> list_notifications
/// POST   /        -> create_notification
/// GET    /types   -> list_notification_types (public)
/// GET    /{id}    -> get_notification
/// PUT    /{id}    -> update_notification
/// DELETE /{id}    -> delete_notification
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route("/types", get(notifications::list_notification_types))
        .route(
            "/{id}",
            get(notifications::get_notification)
                .put(notifications::update_notification)
                .delete(notifications::delete_notification),
        )
}
