use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use triggerflow_core::queue::QueueName;
use triggerflow_pipeline::ingest::openweather::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => bail!("LOG_FORMAT must be 'text' or 'json', got '{other}'"),
        }
    }
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Queues to run a dispatch consumer for.
    pub queues: Vec<QueueName>,
    pub lease: Duration,
    pub poll_interval: Duration,
    pub rule_refresh: Duration,
    /// `None` disables the weather poller.
    pub weather_poll: Option<Duration>,
    pub openweather_api_key: Option<String>,
    pub openweather_base_url: String,
    /// 64 hex chars; `None` leaves sealed source keys unreadable.
    pub source_secret_key: Option<String>,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// | Env Var               | Default                          |
    /// |-----------------------|----------------------------------|
    /// | `DATABASE_URL`        | required                         |
    /// | `WORKER_QUEUES`       | every queue                      |
    /// | `DISPATCH_LEASE_SECS` | `60`                             |
    /// | `DISPATCH_POLL_MS`    | `500`                            |
    /// | `RULE_REFRESH_SECS`   | `60`                             |
    /// | `WEATHER_POLL_SECS`   | `600` (`0` disables polling)     |
    /// | `OPENWEATHER_API_KEY` | unset                            |
    /// | `OPENWEATHER_URL`     | `https://api.openweathermap.org` |
    /// | `SOURCE_SECRET_KEY`   | unset                            |
    /// | `LOG_FORMAT`          | `text`                           |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let queues = match var("WORKER_QUEUES") {
            Some(raw) => QueueName::parse_list(&raw).context("Invalid WORKER_QUEUES")?,
            None => QueueName::ALL.to_vec(),
        };

        let lease =
            Duration::from_secs(parse_or(var("DISPATCH_LEASE_SECS"), "DISPATCH_LEASE_SECS", 60)?);
        if lease.is_zero() {
            bail!("DISPATCH_LEASE_SECS must be greater than zero");
        }
        let poll_interval =
            Duration::from_millis(parse_or(var("DISPATCH_POLL_MS"), "DISPATCH_POLL_MS", 500)?);
        let rule_refresh =
            Duration::from_secs(parse_or(var("RULE_REFRESH_SECS"), "RULE_REFRESH_SECS", 60)?);
        if rule_refresh.is_zero() {
            bail!("RULE_REFRESH_SECS must be greater than zero");
        }
        let weather_poll = match parse_or(var("WEATHER_POLL_SECS"), "WEATHER_POLL_SECS", 600)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let log_format = match var("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Text,
        };

        Ok(Self {
            database_url,
            queues,
            lease,
            poll_interval,
            rule_refresh,
            weather_poll,
            openweather_api_key: var("OPENWEATHER_API_KEY"),
            openweather_base_url: var("OPENWEATHER_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            source_secret_key: var("SOURCE_SECRET_KEY"),
            log_format,
        })
    }
}

fn parse_or(raw: Option<String>, name: &str, default: u64) -> anyhow::Result<u64> {
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer, got '{v}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<WorkerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/tf")]).unwrap();

        assert_eq!(cfg.queues, QueueName::ALL.to_vec());
        assert_eq!(cfg.lease, Duration::from_secs(60));
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert_eq!(cfg.rule_refresh, Duration::from_secs(60));
        assert_eq!(cfg.weather_poll, Some(Duration::from_secs(600)));
        assert_eq!(cfg.openweather_base_url, DEFAULT_BASE_URL);
        assert!(cfg.openweather_api_key.is_none());
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn database_url_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn queues_and_intervals_are_parsed() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/tf"),
            ("WORKER_QUEUES", "notify_email, default"),
            ("DISPATCH_LEASE_SECS", "30"),
            ("DISPATCH_POLL_MS", "50"),
            ("WEATHER_POLL_SECS", "0"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(cfg.queues, vec![QueueName::Default, QueueName::NotifyEmail]);
        assert_eq!(cfg.lease, Duration::from_secs(30));
        assert_eq!(cfg.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.weather_poll, None);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = ("DATABASE_URL", "postgres://localhost/tf");
        assert!(config(&[base, ("WORKER_QUEUES", "default,bogus")]).is_err());
        assert!(config(&[base, ("DISPATCH_POLL_MS", "-1")]).is_err());
        assert!(config(&[base, ("DISPATCH_LEASE_SECS", "0")]).is_err());
        assert!(config(&[base, ("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn zero_rule_refresh_is_rejected() {
        let base = ("DATABASE_URL", "postgres://localhost/tf");
        let err = config(&[base, ("RULE_REFRESH_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("RULE_REFRESH_SECS"), "{err}");
    }

    #[test]
    fn log_format_parsing() {
        assert_matches!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert_matches!(" Json ".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_matches!("yaml".parse::<LogFormat>(), Err(_));
    }
}
