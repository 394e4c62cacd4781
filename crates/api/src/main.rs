use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triggerflow_api::config::ServerConfig;
use triggerflow_api::router::build_app_router;
use triggerflow_api::state::AppState;
use triggerflow_core::secrets::{SecretCipher, SourceSecrets};
use triggerflow_events::EmailConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triggerflow_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = triggerflow_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    triggerflow_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    triggerflow_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Credentials & delivery ---
    let secrets = std::env::var("SOURCE_SECRET_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .map(|key| {
            SourceSecrets::new(
                SecretCipher::from_hex(&key).expect("SOURCE_SECRET_KEY must be 64 hex characters"),
            )
        });
    if secrets.is_none() {
        tracing::warn!("SOURCE_SECRET_KEY not set, sources cannot store a source_key");
    }

    let email = EmailConfig::from_env();
    if email.is_none() {
        tracing::warn!("SMTP_HOST not set, email notifications will be skipped");
    }

    // --- App state ---
    let state = AppState::new(pool, config.clone(), email, secrets);

    match state.rules.refresh().await {
        Ok(rules) => tracing::info!(rules = rules.len(), "Initial rules materialized"),
        Err(e) => tracing::error!(error = %e, "Initial rule materialization failed"),
    }

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let rules = Arc::clone(&state.rules);
    let refresh_every = Duration::from_secs(config.rule_refresh_secs);
    let refresh_cancel = cancel.clone();
    let refresh_handle = tokio::spawn(async move {
        rules.run(refresh_every, refresh_cancel).await;
    });

    tracing::info!("Rule cache refresher started");

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    let _ = tokio::time::timeout(grace, refresh_handle).await;
    tracing::info!("Rule cache refresher stopped");

    tracing::info!("Graceful shutdown complete");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
