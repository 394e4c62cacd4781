//! Handlers for the `/notifications` resource.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use triggerflow_core::error::CoreError;
use triggerflow_core::queue::QueueName;
use triggerflow_core::types::DbId;
use triggerflow_db::models::catalog::{CatalogKind, CatalogType};
use triggerflow_db::models::notification::{
    CreateNotification, Notification, UpdateNotification,
};
use triggerflow_db::repositories::{CatalogRepo, NotificationRepo};
use triggerflow_events::{NotificationRegistry, NotificationTypeDescription};

use crate::error::{AppError, AppResult};
use crate::handlers::ensure_catalog_type;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Catalog row joined with the channel registered under the same name.
///
/// The routing fields are `None` for catalog entries without a channel.
#[derive(Debug, Serialize)]
pub struct NotificationTypeView {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub queue: Option<QueueName>,
    pub routing_key: Option<&'static str>,
    pub config: Option<Value>,
}

/// GET /api/v1/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let notifications = NotificationRepo::list(&state.pool, user.owner_scope()).await?;
    Ok(Json(DataResponse {
        data: notifications,
    }))
}

/// POST /api/v1/notifications
pub async fn create_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateNotification>,
) -> AppResult<(StatusCode, Json<DataResponse<Notification>>)> {
    let notification_type =
        ensure_catalog_type(&state, CatalogKind::Notification, input.notification_type_id)
            .await?;
    let empty = Value::Object(Default::default());
    validate_config(&state, &notification_type.name, input.config.as_ref().unwrap_or(&empty))?;

    let notification = NotificationRepo::create(&state.pool, user.user_id, &input).await?;
    tracing::info!(
        user_id = user.user_id,
        notification_id = notification.id,
        notification_type = %notification_type.name,
        "Notification created"
    );

    state.refresh_rules().await;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse { data: notification }),
    ))
}

/// GET /api/v1/notifications/{id}
pub async fn get_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let notification = NotificationRepo::find_by_id(&state.pool, id, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: notification }))
}

/// PUT /api/v1/notifications/{id}
pub async fn update_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateNotification>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let existing = NotificationRepo::find_by_id(&state.pool, id, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;

    if input.notification_type_id.is_some() || input.config.is_some() {
        let type_id = input
            .notification_type_id
            .unwrap_or(existing.notification_type_id);
        let notification_type =
            ensure_catalog_type(&state, CatalogKind::Notification, type_id).await?;
        let config = input.config.as_ref().unwrap_or(&existing.config);
        validate_config(&state, &notification_type.name, config)?;
    }

    let notification = NotificationRepo::update(&state.pool, id, &input, user.owner_scope())
        .await?
        .ok_or_else(|| not_found(id))?;

    state.refresh_rules().await;
    Ok(Json(DataResponse { data: notification }))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !NotificationRepo::delete(&state.pool, id, user.owner_scope()).await? {
        return Err(not_found(id));
    }
    tracing::info!(
        user_id = user.user_id,
        notification_id = id,
        "Notification deleted"
    );

    state.refresh_rules().await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/notifications/types (public)
pub async fn list_notification_types(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<NotificationTypeView>>>> {
    let catalog = CatalogRepo::list(&state.pool, CatalogKind::Notification).await?;
    Ok(Json(DataResponse {
        data: describe_notification_types(catalog, &state.notifications),
    }))
}

pub fn describe_notification_types(
    catalog: Vec<CatalogType>,
    registry: &NotificationRegistry,
) -> Vec<NotificationTypeView> {
    let mut described: HashMap<String, NotificationTypeDescription> = registry
        .describe_all()
        .into_iter()
        .map(|d| (d.name.clone(), d))
        .collect();

    catalog
        .into_iter()
        .map(|row| {
            let channel = described.remove(&row.name);
            NotificationTypeView {
                id: row.id,
                queue: channel.as_ref().map(|c| c.queue),
                routing_key: channel.as_ref().map(|c| c.routing_key),
                config: channel.map(|c| c.config),
                name: row.name,
                description: row.description,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Notification",
        id,
    })
}

/// A catalog type without a registered channel cannot be delivered, so it
/// is rejected here rather than skipped at dispatch.
fn validate_config(state: &AppState, type_name: &str, config: &Value) -> AppResult<()> {
    if !config.is_object() {
        return Err(AppError::Core(CoreError::Validation(
            "Notification config must be a JSON object".into(),
        )));
    }
    state
        .notifications
        .get(type_name)?
        .validate_config(type_name, config)?;
    Ok(())
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
            description: String::new(),
            config: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn catalog_rows_carry_channel_routing() {
        let views = describe_notification_types(
            vec![row(1, "console"), row(2, "email"), row(3, "sms")],
            &NotificationRegistry::builtin(None),
        );

        assert_eq!(views[0].queue, Some(QueueName::Default));
        assert_eq!(views[1].queue, Some(QueueName::NotifyEmail));
        assert_eq!(
            views[1].routing_key,
            Some(QueueName::NotifyEmail.routing_key())
        );
        assert!(views[1].config.as_ref().unwrap().get("email").is_some());

        assert_eq!(views[2].name, "sms");
        assert!(views[2].queue.is_none());
        assert!(views[2].config.is_none());
    }
}
