use std::sync::Arc;

use triggerflow_core::secrets::SourceSecrets;
use triggerflow_core::trigger::TriggerRegistry;
use triggerflow_events::{EmailConfig, NotificationRegistry};
use triggerflow_pipeline::{PgStore, RuleCache, RuleEngine, RuleMaterializer};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: triggerflow_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub triggers: Arc<TriggerRegistry>,
    pub notifications: Arc<NotificationRegistry>,
    /// Rule snapshot shared with the engine.
    pub rules: Arc<RuleCache>,
    /// Evaluates payloads submitted over HTTP.
    pub engine: Arc<RuleEngine>,
    /// `None` when `SOURCE_SECRET_KEY` is not configured.
    pub secrets: Option<SourceSecrets>,
}

impl AppState {
    /// Wire the registries, rule cache and engine over `pool`.
    pub fn new(
        pool: triggerflow_db::DbPool,
        config: ServerConfig,
        email: Option<EmailConfig>,
        secrets: Option<SourceSecrets>,
    ) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        let triggers = Arc::new(TriggerRegistry::builtin());
        let notifications = Arc::new(NotificationRegistry::builtin(email));
        let rules = Arc::new(RuleCache::new(RuleMaterializer::new(store.clone())));
        let engine = Arc::new(RuleEngine::new(
            Arc::clone(&rules),
            Arc::clone(&triggers),
            Arc::clone(&notifications),
            store.clone(),
            store,
        ));

        Self {
            pool,
            config: Arc::new(config),
            triggers,
            notifications,
            rules,
            engine,
            secrets,
        }
    }

    /// Re-materialize after a change to sources, triggers or notifications.
    ///
    /// Failure is logged and swallowed: the periodic refresh catches up.
    pub async fn refresh_rules(&self) {
        if let Err(e) = self.rules.refresh().await {
            tracing::warn!(error = %e, "Rule refresh after write failed");
        }
    }
}
