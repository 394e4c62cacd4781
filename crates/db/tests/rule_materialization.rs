//! Postgres-backed tests for the rule join and the owner-scoped repositories.

use serde_json::json;
use sqlx::PgPool;
use triggerflow_core::rule::{assemble_rules, Rule, RuleKey};
use triggerflow_core::types::DbId;
use triggerflow_db::models::catalog::CatalogKind;
use triggerflow_db::models::notification::{CreateNotification, UpdateNotification};
use triggerflow_db::models::source::{CreateSource, UpdateSource};
use triggerflow_db::models::trigger::{CreateTrigger, UpdateTrigger};
use triggerflow_db::models::user::CreateUser;
use triggerflow_db::repositories::{
    CatalogRepo, NotificationRepo, RuleRepo, SourceRepo, TriggerRepo, UserRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn type_id(pool: &PgPool, kind: CatalogKind, name: &str) -> DbId {
    CatalogRepo::find_by_name(pool, kind, name)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("{name} should be seeded"))
        .id
}

async fn user(pool: &PgPool, name: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "x".to_string(),
            is_superuser: false,
        },
    )
    .await
    .unwrap()
    .id
}

async fn source(pool: &PgPool, owner: DbId, name: &str) -> DbId {
    let source_type_id = type_id(pool, CatalogKind::Source, "openweather").await;
    SourceRepo::create(
        pool,
        owner,
        &CreateSource {
            source_type_id,
            name: name.to_string(),
            config: Some(json!({"city": "Berlin"})),
            is_active: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn trigger(pool: &PgPool, owner: DbId, source_id: Option<DbId>) -> DbId {
    let trigger_type_id = type_id(pool, CatalogKind::Trigger, "temperature").await;
    TriggerRepo::create(
        pool,
        owner,
        &CreateTrigger {
            source_id,
            trigger_type_id,
            name: "hot".to_string(),
            config: json!({"temp": 30, "op": ">"}),
            is_active: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn notification(pool: &PgPool, owner: DbId) -> DbId {
    let notification_type_id = type_id(pool, CatalogKind::Notification, "console").await;
    NotificationRepo::create(
        pool,
        owner,
        &CreateNotification {
            notification_type_id,
            name: Some("log".to_string()),
            description: None,
            config: None,
            is_active: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn materialize(pool: &PgPool) -> Vec<Rule> {
    let rows = RuleRepo::load_rule_rows(pool).await.unwrap();
    assemble_rules(rows.into_iter().map(Into::into))
}

fn find(rules: &[Rule], user_id: DbId, source_id: DbId, trigger_id: DbId) -> Option<&Rule> {
    let key = RuleKey { user_id, source_id, trigger_id };
    rules.iter().find(|r| r.key() == key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_catalogs_are_seeded(pool: PgPool) {
    triggerflow_db::health_check(&pool).await.unwrap();
    for (kind, name) in [
        (CatalogKind::Source, "openweather"),
        (CatalogKind::Trigger, "temperature"),
        (CatalogKind::Notification, "console"),
        (CatalogKind::Notification, "email"),
        (CatalogKind::Notification, "webhook"),
    ] {
        assert!(CatalogRepo::find_by_name(&pool, kind, name).await.unwrap().is_some());
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rule_groups_notifications(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let s = source(&pool, alice, "home").await;
    let t = trigger(&pool, alice, Some(s)).await;
    let n1 = notification(&pool, alice).await;
    let n2 = notification(&pool, alice).await;

    let rules = materialize(&pool).await;
    assert_eq!(rules.len(), 1);
    let rule = find(&rules, alice, s, t).unwrap();
    assert_eq!(rule.trigger_type, "temperature");
    assert_eq!(rule.trigger_params, json!({"temp": 30, "op": ">"}));
    assert_eq!(rule.notification_ids, vec![n1.min(n2), n1.max(n2)]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rule_without_notifications(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let s = source(&pool, alice, "home").await;
    let t = trigger(&pool, alice, Some(s)).await;

    let rules = materialize(&pool).await;
    assert!(find(&rules, alice, s, t).unwrap().notification_ids.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unbound_trigger_fans_out_to_owner_sources(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let s1 = source(&pool, alice, "home").await;
    let s2 = source(&pool, alice, "office").await;
    let bound = trigger(&pool, alice, Some(s1)).await;
    let unbound = trigger(&pool, alice, None).await;

    let rules = materialize(&pool).await;
    assert_eq!(rules.len(), 3);
    assert!(find(&rules, alice, s1, bound).is_some());
    assert!(find(&rules, alice, s2, bound).is_none());
    assert!(find(&rules, alice, s1, unbound).is_some());
    assert!(find(&rules, alice, s2, unbound).is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ownership_isolation(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;
    let sa = source(&pool, alice, "a").await;
    let sb = source(&pool, bob, "b").await;
    let ta = trigger(&pool, alice, None).await;
    let tb = trigger(&pool, bob, None).await;
    let na = notification(&pool, alice).await;
    let nb = notification(&pool, bob).await;

    let rules = materialize(&pool).await;
    assert_eq!(rules.len(), 2);
    let ra = find(&rules, alice, sa, ta).unwrap();
    let rb = find(&rules, bob, sb, tb).unwrap();
    assert_eq!(ra.notification_ids, vec![na]);
    assert_eq!(rb.notification_ids, vec![nb]);
    assert!(find(&rules, alice, sb, ta).is_none());
    assert!(find(&rules, bob, sa, tb).is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_active_flags_gate_rules(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let s = source(&pool, alice, "home").await;
    let t = trigger(&pool, alice, Some(s)).await;
    let n = notification(&pool, alice).await;

    // Source
    SourceRepo::update(&pool, s, &UpdateSource { is_active: Some(false), ..Default::default() }, None)
        .await
        .unwrap();
    assert!(materialize(&pool).await.is_empty());
    SourceRepo::update(&pool, s, &UpdateSource { is_active: Some(true), ..Default::default() }, None)
        .await
        .unwrap();
    assert_eq!(materialize(&pool).await.len(), 1);

    // Trigger
    TriggerRepo::update(&pool, t, &UpdateTrigger { is_active: Some(false), ..Default::default() }, None)
        .await
        .unwrap();
    assert!(materialize(&pool).await.is_empty());
    TriggerRepo::update(&pool, t, &UpdateTrigger { is_active: Some(true), ..Default::default() }, None)
        .await
        .unwrap();

    // Notification: rule stays, id disappears
    NotificationRepo::update(
        &pool,
        n,
        &UpdateNotification { is_active: Some(false), ..Default::default() },
        None,
    )
    .await
    .unwrap();
    let rules = materialize(&pool).await;
    assert!(find(&rules, alice, s, t).unwrap().notification_ids.is_empty());
    NotificationRepo::update(
        &pool,
        n,
        &UpdateNotification { is_active: Some(true), ..Default::default() },
        None,
    )
    .await
    .unwrap();
    let rules = materialize(&pool).await;
    assert_eq!(find(&rules, alice, s, t).unwrap().notification_ids, vec![n]);

    // User
    sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
        .bind(alice)
        .execute(&pool)
        .await
        .unwrap();
    assert!(materialize(&pool).await.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_materialization_is_idempotent(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;
    for owner in [alice, bob] {
        let s = source(&pool, owner, "home").await;
        trigger(&pool, owner, Some(s)).await;
        trigger(&pool, owner, None).await;
        notification(&pool, owner).await;
    }

    let first = materialize(&pool).await;
    let second = materialize(&pool).await;
    assert_eq!(first, second);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_owner_scoping_on_crud(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;
    let s = source(&pool, alice, "home").await;

    assert!(SourceRepo::find_by_id(&pool, s, Some(bob)).await.unwrap().is_none());
    assert!(SourceRepo::find_by_id(&pool, s, Some(alice)).await.unwrap().is_some());
    assert!(SourceRepo::find_by_id(&pool, s, None).await.unwrap().is_some());
    assert!(SourceRepo::list(&pool, Some(bob)).await.unwrap().is_empty());

    let renamed = UpdateSource { name: Some("renamed".into()), ..Default::default() };
    assert!(SourceRepo::update(&pool, s, &renamed, Some(bob)).await.unwrap().is_none());
    let updated = SourceRepo::update(&pool, s, &renamed, Some(alice)).await.unwrap().unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.config, json!({"city": "Berlin"}));

    assert!(!SourceRepo::delete(&pool, s, Some(bob)).await.unwrap());
    assert!(SourceRepo::delete(&pool, s, Some(alice)).await.unwrap());
}
