//! Sources, triggers and notifications over HTTP against Postgres, through
//! to rule materialization and payload evaluation.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{
    body_json, delete_auth, get, get_auth, post_json_auth, put_json_auth, token_for,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use triggerflow_core::secrets::SEALED_PREFIX;
use triggerflow_core::types::DbId;
use triggerflow_db::models::catalog::CatalogKind;
use triggerflow_db::models::dispatch_job::DispatchJobListQuery;
use triggerflow_db::models::user::CreateUser;
use triggerflow_db::repositories::{CatalogRepo, DispatchJobRepo, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn user_token(pool: &PgPool, name: &str) -> String {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "x".to_string(),
            is_superuser: false,
        },
    )
    .await
    .unwrap();
    token_for(user.id, false)
}

async fn type_id(pool: &PgPool, kind: CatalogKind, name: &str) -> DbId {
    CatalogRepo::find_by_name(pool, kind, name)
        .await
        .unwrap()
        .unwrap()
        .id
}

/// POST and return `data` of a 201 response.
async fn create(app: &Router, uri: &str, body: Value, token: &str) -> Value {
    let response = post_json_auth(app.clone(), uri, body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED, "POST {uri}");
    body_json(response).await["data"].clone()
}

/// One source with a `temp < 0` trigger and a console notification.
async fn cold_alert(app: &Router, pool: &PgPool, token: &str) -> (DbId, DbId, DbId) {
    let source = create(
        app,
        "/api/v1/sources",
        json!({
            "source_type_id": type_id(pool, CatalogKind::Source, "openweather").await,
            "name": "home",
            "config": {"city": "Oslo"},
        }),
        token,
    )
    .await;
    let trigger = create(
        app,
        "/api/v1/triggers",
        json!({
            "source_id": source["id"],
            "trigger_type_id": type_id(pool, CatalogKind::Trigger, "temperature").await,
            "name": "freezing",
            "config": {"temp": 0, "op": "<"},
        }),
        token,
    )
    .await;
    let notification = create(
        app,
        "/api/v1/notifications",
        json!({
            "notification_type_id": type_id(pool, CatalogKind::Notification, "console").await,
            "name": "log it",
        }),
        token,
    )
    .await;
    (
        source["id"].as_i64().unwrap(),
        trigger["id"].as_i64().unwrap(),
        notification["id"].as_i64().unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_type_discovery(pool: PgPool) {
    let app = common::build_test_app(pool.clone());

    let json = body_json(get(app.clone(), "/api/v1/triggers/types").await).await;
    let temperature = &json["data"][0];
    assert_eq!(temperature["name"], "temperature");
    assert!(temperature["params"]["op"].is_string());

    let json = body_json(get(app.clone(), "/api/v1/notifications/types").await).await;
    let email = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "email")
        .unwrap()
        .clone();
    assert_eq!(email["queue"], "notify_email");
    assert_eq!(email["routing_key"], "notify.email");

    let token = user_token(&pool, "viewer").await;
    let json = body_json(get_auth(app, "/api/v1/sources/types", &token).await).await;
    assert_eq!(json["data"][0]["name"], "openweather");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_invalid_definitions_are_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = user_token(&pool, "alice").await;
    let temperature = type_id(&pool, CatalogKind::Trigger, "temperature").await;
    let email = type_id(&pool, CatalogKind::Notification, "email").await;

    let cases = [
        (
            "/api/v1/triggers",
            json!({"trigger_type_id": temperature, "name": "x", "config": {"temp": 1, "op": ">="}}),
        ),
        (
            "/api/v1/triggers",
            json!({"trigger_type_id": 9999, "name": "x", "config": {"temp": 1, "op": ">"}}),
        ),
        (
            "/api/v1/notifications",
            json!({"notification_type_id": email, "config": {}}),
        ),
        (
            "/api/v1/sources",
            json!({"source_type_id": 1, "name": "x", "config": [1]}),
        ),
    ];
    for (uri, body) in cases {
        let response = post_json_auth(app.clone(), uri, body.clone(), &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {body}");
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_source_key_is_stored_sealed(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = user_token(&pool, "alice").await;

    let source = create(
        &app,
        "/api/v1/sources",
        json!({
            "source_type_id": type_id(&pool, CatalogKind::Source, "openweather").await,
            "name": "home",
            "config": {"city": "Oslo", "source_key": "owm-plaintext"},
        }),
        &token,
    )
    .await;

    let sealed = source["config"]["source_key"].as_str().unwrap();
    assert!(sealed.starts_with(SEALED_PREFIX));
    assert!(!sealed.contains("owm-plaintext"));
    assert_eq!(source["config"]["city"], "Oslo");

    // Read, edit another field, write back: the credential is not sealed twice.
    let uri = format!("/api/v1/sources/{}", source["id"]);
    let mut config = body_json(get_auth(app.clone(), &uri, &token).await).await["data"]["config"]
        .clone();
    config["city"] = json!("Bergen");
    let response = put_json_auth(app.clone(), &uri, json!({"config": config}), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await;
    assert_eq!(updated["data"]["config"]["city"], "Bergen");
    assert_eq!(updated["data"]["config"]["source_key"], sealed);
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_resources_are_owner_scoped(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let alice = user_token(&pool, "alice").await;
    let mallory = user_token(&pool, "mallory").await;
    let (source_id, trigger_id, _) = cold_alert(&app, &pool, &alice).await;

    let response = get_auth(app.clone(), &format!("/api/v1/sources/{source_id}"), &mallory).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/triggers/{trigger_id}"),
        &mallory,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(get_auth(app.clone(), "/api/v1/sources", &mallory).await).await;
    assert_eq!(json["data"], json!([]));

    // Binding a trigger to someone else's source is refused.
    let response = post_json_auth(
        app.clone(),
        "/api/v1/triggers",
        json!({
            "source_id": source_id,
            "trigger_type_id": type_id(&pool, CatalogKind::Trigger, "temperature").await,
            "name": "spy",
            "config": {"temp": 0, "op": "<"},
        }),
        &mallory,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let rules = body_json(get_auth(app, "/api/v1/rules", &mallory).await).await;
    assert_eq!(rules["data"]["rules"], json!([]));
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_payload_dispatches_matching_rule(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = user_token(&pool, "alice").await;
    let (source_id, trigger_id, notification_id) = cold_alert(&app, &pool, &token).await;

    let rules = body_json(get_auth(app.clone(), "/api/v1/rules", &token).await).await;
    assert_eq!(rules["data"]["rules"][0]["trigger_id"], trigger_id);
    assert_eq!(
        rules["data"]["rules"][0]["notification_ids"],
        json!([notification_id])
    );

    let uri = format!("/api/v1/sources/{source_id}/payloads");
    let response = post_json_auth(app.clone(), &uri, json!({"temp": -4.5}), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await["data"].clone();
    assert_eq!(report["evaluated"], 1);
    assert_eq!(report["dispatched"][0]["notification_id"], notification_id);
    assert_eq!(report["dispatched"][0]["queue"], "default");

    let jobs = DispatchJobRepo::list(&pool, &DispatchJobListQuery::default())
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].notification_type, "console");
    assert_eq!(jobs[0].payload, json!({"temp": -4.5}));

    // Not cold enough: evaluated, nothing dispatched.
    let response = post_json_auth(app, &uri, json!({"temp": 3}), &token).await;
    let report = body_json(response).await["data"].clone();
    assert_eq!(report["evaluated"], 1);
    assert_eq!(report["matched"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deactivated_trigger_leaves_the_rule_set(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = user_token(&pool, "alice").await;
    let (source_id, trigger_id, _) = cold_alert(&app, &pool, &token).await;

    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/triggers/{trigger_id}"),
        json!({"is_active": false}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["is_active"], false);

    let response = post_json_auth(
        app,
        &format!("/api/v1/sources/{source_id}/payloads"),
        json!({"temp": -10}),
        &token,
    )
    .await;
    let report = body_json(response).await["data"].clone();
    assert_eq!(report["evaluated"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_admin_can_materialize_and_list_jobs(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = user_token(&pool, "alice").await;
    cold_alert(&app, &pool, &token).await;
    let admin = token_for(1_000_000, true);

    let response = common::post_auth(app.clone(), "/api/v1/admin/rules/materialize", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["rules"].as_array().unwrap().len(), 1);
    assert!(json["data"]["materialized_at"].is_string());

    let response = get_auth(app, "/api/v1/admin/dispatch-jobs?queue=default", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!([]));
}
