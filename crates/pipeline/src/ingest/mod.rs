//! Ingestion: turn external observations into payload events.
//!
//! [`WeatherPoller`] reads every active `openweather` source, fetches the
//! current weather for its location and publishes the normalized payload
//! on the event bus. One failing source never stops the others.

pub mod openweather;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use triggerflow_core::secrets::{SecretError, SourceSecrets, SOURCE_KEY_FIELD};
use triggerflow_db::models::source::ActiveSource;
use triggerflow_db::repositories::SourceRepo;
use triggerflow_db::DbPool;
use triggerflow_events::{EventBus, SourcePayloadEvent};

pub use openweather::{normalize_weather, OpenWeatherClient, WeatherLocation};

/// Source type name polled by [`WeatherPoller`].
pub const SOURCE_OPENWEATHER: &str = "openweather";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid source config: {0}")]
    InvalidConfig(String),

    #[error("No API key: set 'source_key' on the source or OPENWEATHER_API_KEY")]
    MissingApiKey,

    #[error("Source key is sealed but no SOURCE_SECRET_KEY is configured")]
    SecretsUnavailable,

    #[error("Source key could not be opened: {0}")]
    Secret(#[from] SecretError),

    #[error("Weather request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Weather API returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Unexpected weather response: {0}")]
    UnexpectedResponse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Pick the API key for a source: its own sealed `source_key` when present,
/// otherwise the global fallback.
pub fn resolve_api_key(
    secrets: Option<&SourceSecrets>,
    config: &Value,
    fallback: Option<&str>,
) -> Result<String, IngestError> {
    let sealed = config
        .get(SOURCE_KEY_FIELD)
        .is_some_and(|v| !v.is_null());
    if sealed {
        let secrets = secrets.ok_or(IngestError::SecretsUnavailable)?;
        return Ok(secrets.open_required(config)?);
    }
    fallback
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or(IngestError::MissingApiKey)
}

// ---------------------------------------------------------------------------
// WeatherPoller
// ---------------------------------------------------------------------------

pub struct WeatherPoller {
    pool: DbPool,
    client: OpenWeatherClient,
    secrets: Option<SourceSecrets>,
    fallback_api_key: Option<String>,
    bus: Arc<EventBus>,
}

impl WeatherPoller {
    pub fn new(
        pool: DbPool,
        client: OpenWeatherClient,
        secrets: Option<SourceSecrets>,
        fallback_api_key: Option<String>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            client,
            secrets,
            fallback_api_key,
            bus,
        }
    }

    /// Poll every active source once. Returns how many payloads were
    /// published.
    pub async fn poll_once(&self) -> Result<usize, IngestError> {
        let sources = SourceRepo::list_active_by_type(&self.pool, SOURCE_OPENWEATHER).await?;
        let mut published = 0;

        for source in &sources {
            match self.poll_source(source).await {
                Ok(event) => {
                    self.bus.publish(event);
                    published += 1;
                }
                Err(e) => {
                    tracing::warn!(source_id = source.id, source = %source.name, error = %e, "Weather poll failed");
                }
            }
        }

        tracing::debug!(sources = sources.len(), published, "Weather poll complete");
        Ok(published)
    }

    async fn poll_source(&self, source: &ActiveSource) -> Result<SourcePayloadEvent, IngestError> {
        let location = WeatherLocation::from_config(&source.config)?;
        let api_key = resolve_api_key(
            self.secrets.as_ref(),
            &source.config,
            self.fallback_api_key.as_deref(),
        )?;
        let units = openweather::units_from_config(&source.config);

        let raw = self.client.current_weather(&api_key, &location, units).await?;
        let payload = normalize_weather(&raw)?;

        let mut event = SourcePayloadEvent::new(source.id, payload);
        if let Some(at) = openweather::observed_at(&event.payload) {
            event = event.with_received_at(at);
        }
        Ok(event)
    }

    /// Poll on a fixed interval until `cancel` fires.
    pub async fn run(&self, every: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Weather poller cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Weather poll cycle failed");
                    }
                }
            }
        }
    }
}
