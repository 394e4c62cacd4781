pub mod admin;
pub mod auth;
pub mod health;
pub mod notifications;
pub mod rules;
pub mod sources;
pub mod triggers;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                       register (public)
/// /auth/login                          login (public)
/// /auth/refresh                        refresh (public)
/// /auth/logout                         logout (requires auth)
/// /auth/me                             current user (requires auth)
///
/// /sources                             list, create
/// /sources/types                       source type catalog
/// /sources/{id}                        get, update, delete
/// /sources/{id}/payloads               evaluate a payload now (POST)
///
/// /triggers                            list, create
/// /triggers/types                      trigger type catalog (public)
/// /triggers/{id}                       get, update, delete
///
/// /notifications                       list, create
/// /notifications/types                 notification type catalog (public)
/// /notifications/{id}                  get, update, delete
///
/// /rules                               caller's materialized rules
///
/// /admin/rules/materialize             refresh the rule cache (POST, superuser)
/// /admin/dispatch-jobs                 recent dispatch jobs (superuser)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication routes (register, login, refresh, logout, me).
        .nest("/auth", auth::router())
        // Owner-scoped resources.
        .nest("/sources", sources::router())
        .nest("/triggers", triggers::router())
        .nest("/notifications", notifications::router())
        .nest("/rules", rules::router())
        // Superuser operations.
        .nest("/admin", admin::router())
}
