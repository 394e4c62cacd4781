//! Background worker: keeps the rule cache fresh, evaluates payloads from
//! the weather poller, and delivers dispatch jobs from the configured
//! queues.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triggerflow_core::secrets::{SecretCipher, SourceSecrets};
use triggerflow_core::trigger::TriggerRegistry;
use triggerflow_events::{EmailConfig, EventBus, NotificationRegistry};
use triggerflow_pipeline::{
    DispatchConsumer, OpenWeatherClient, PgStore, RuleCache, RuleEngine, RuleMaterializer,
    WeatherPoller,
};

use config::{LogFormat, WorkerConfig};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(
        queues = ?config.queues,
        weather_poll = ?config.weather_poll,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = triggerflow_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    triggerflow_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let secrets = config
        .source_secret_key
        .as_deref()
        .map(SecretCipher::from_hex)
        .transpose()
        .context("Invalid SOURCE_SECRET_KEY")?
        .map(SourceSecrets::new);

    // --- Pipeline ---
    let store = Arc::new(PgStore::new(pool.clone()));
    let triggers = Arc::new(TriggerRegistry::builtin());
    let notifications = Arc::new(NotificationRegistry::builtin(EmailConfig::from_env()));
    tracing::info!(
        triggers = ?triggers.names().collect::<Vec<_>>(),
        notifications = ?notifications.names().collect::<Vec<_>>(),
        "Registries built"
    );
    let rules = Arc::new(RuleCache::new(RuleMaterializer::new(store.clone())));
    let engine = Arc::new(RuleEngine::new(
        Arc::clone(&rules),
        triggers,
        Arc::clone(&notifications),
        store.clone(),
        store.clone(),
    ));
    let event_bus = Arc::new(EventBus::default());

    match rules.refresh().await {
        Ok(set) => tracing::info!(rules = set.len(), "Initial rules materialized"),
        Err(e) => tracing::error!(error = %e, "Initial rule materialization failed"),
    }

    let cancel = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    {
        let rules = Arc::clone(&rules);
        let cancel = cancel.clone();
        let every = config.rule_refresh;
        tasks.push(tokio::spawn(async move { rules.run(every, cancel).await }));
    }

    let engine_handle = tokio::spawn(Arc::clone(&engine).run(event_bus.subscribe()));

    let routed = notifications.queues();
    for &queue in &config.queues {
        if !routed.contains(&queue) {
            tracing::warn!(%queue, "No notification channel routes to this queue");
        }
        tracing::info!(
            %queue,
            exchange = queue.exchange(),
            routing_key = queue.routing_key(),
            "Starting dispatch consumer"
        );
        let consumer = DispatchConsumer::new(queue, store.clone(), Arc::clone(&notifications))
            .with_lease(config.lease)
            .with_poll_interval(config.poll_interval);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move { consumer.run(cancel).await }));
    }

    match config.weather_poll {
        Some(every) => {
            let poller = WeatherPoller::new(
                pool.clone(),
                OpenWeatherClient::new(config.openweather_base_url.clone()),
                secrets,
                config.openweather_api_key.clone(),
                Arc::clone(&event_bus),
            );
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move { poller.run(every, cancel).await }));
        }
        None => tracing::info!("Weather polling disabled"),
    }

    tracing::info!(tasks = tasks.len() + 1, "Worker started");

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    for task in tasks {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
    }
    // The poller held the only other bus handle; the engine loop ends once
    // the last sender is gone.
    drop(event_bus);
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, engine_handle).await;

    tracing::info!("Worker stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "triggerflow_worker=debug,triggerflow_pipeline=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
