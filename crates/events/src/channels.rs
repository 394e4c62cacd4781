//! Notification channels and the notification type registry.
//!
//! A [`NotificationChannel`] turns a matched payload into a side effect:
//! a log line, an email, a webhook call. Channels never return an error to
//! their caller; the outcome is reported as a [`DeliveryOutcome`] and any
//! failure is logged by the channel itself.
//!
//! Each channel is bound to one dispatch queue so a slow transport (SMTP)
//! cannot hold up the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use triggerflow_core::error::EvaluationError;
use triggerflow_core::queue::QueueName;

use crate::delivery::email::{alert_body, EmailConfig, EmailDelivery, ALERT_SUBJECT};
use crate::delivery::webhook::WebhookDelivery;

pub const NOTIFY_CONSOLE: &str = "console";
pub const NOTIFY_EMAIL: &str = "email";
pub const NOTIFY_WEBHOOK: &str = "webhook";

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Nothing was sent and nothing should be retried (e.g. SMTP is not
    /// configured, or the config has no recipient).
    Skipped(String),
    /// The transport failed.
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DeliveryOutcome::Failed(_))
    }
}

// ---------------------------------------------------------------------------
// NotificationChannel
// ---------------------------------------------------------------------------

/// Closed set of delivery channels.
#[derive(Debug, Clone)]
pub enum NotificationChannel {
    /// Writes the payload to the log.
    Console,
    /// Sends an alert email to `config.email`. `None` when SMTP is not
    /// configured.
    Email(Option<Arc<EmailDelivery>>),
    /// POSTs the payload to `config.url`.
    Webhook(Arc<WebhookDelivery>),
}

impl NotificationChannel {
    /// Queue the channel's dispatch jobs are routed to.
    pub fn queue(&self) -> QueueName {
        match self {
            NotificationChannel::Console => QueueName::Default,
            NotificationChannel::Email(_) => QueueName::NotifyEmail,
            NotificationChannel::Webhook(_) => QueueName::Default,
        }
    }

    /// Config keys the channel requires, with a human-readable description.
    pub fn describe(&self) -> Value {
        match self {
            NotificationChannel::Console => json!({}),
            NotificationChannel::Email(_) => json!({"email": "Recipient address"}),
            NotificationChannel::Webhook(_) => json!({"url": "HTTP(S) URL receiving a JSON POST"}),
        }
    }

    fn required_key(&self) -> Option<&'static str> {
        match self {
            NotificationChannel::Console => None,
            NotificationChannel::Email(_) => Some("email"),
            NotificationChannel::Webhook(_) => Some("url"),
        }
    }

    /// Check that `config` carries every key the channel needs.
    pub fn validate_config(&self, type_name: &str, config: &Value) -> Result<(), EvaluationError> {
        let Some(key) = self.required_key() else {
            return Ok(());
        };
        match config.get(key).and_then(Value::as_str) {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err(EvaluationError::InvalidNotificationConfig {
                notification_type: type_name.to_string(),
                reason: format!("'{key}' must be a non-empty string"),
            }),
        }
    }

    /// Deliver `payload` using the per-notification `config`.
    pub async fn send(&self, payload: &Value, config: &Value) -> DeliveryOutcome {
        match self {
            NotificationChannel::Console => {
                tracing::info!(payload = %payload, "Trigger matched");
                DeliveryOutcome::Delivered
            }
            NotificationChannel::Email(mailer) => {
                let Some(mailer) = mailer else {
                    tracing::warn!("SMTP is not configured, skipping email notification");
                    return DeliveryOutcome::Skipped("SMTP is not configured".into());
                };
                let Some(to) = config.get("email").and_then(Value::as_str) else {
                    tracing::warn!("Email notification has no recipient, skipping");
                    return DeliveryOutcome::Skipped("no recipient in config".into());
                };
                match mailer.deliver(to, ALERT_SUBJECT, alert_body(payload)).await {
                    Ok(()) => DeliveryOutcome::Delivered,
                    Err(e) => {
                        tracing::error!(to, error = %e, "Email notification failed");
                        DeliveryOutcome::Failed(e.to_string())
                    }
                }
            }
            NotificationChannel::Webhook(client) => {
                let Some(url) = config.get("url").and_then(Value::as_str) else {
                    tracing::warn!("Webhook notification has no url, skipping");
                    return DeliveryOutcome::Skipped("no url in config".into());
                };
                match client.deliver(url, payload).await {
                    Ok(()) => DeliveryOutcome::Delivered,
                    Err(e) => DeliveryOutcome::Failed(e.to_string()),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationRegistry
// ---------------------------------------------------------------------------

/// Discovery entry returned by [`NotificationRegistry::describe_all`].
#[derive(Debug, Clone, Serialize)]
pub struct NotificationTypeDescription {
    pub name: String,
    pub queue: QueueName,
    pub routing_key: &'static str,
    pub config: Value,
}

/// Immutable mapping from notification type name to channel.
#[derive(Debug, Clone)]
pub struct NotificationRegistry {
    channels: BTreeMap<String, NotificationChannel>,
}

impl NotificationRegistry {
    pub fn builder() -> NotificationRegistryBuilder {
        NotificationRegistryBuilder::default()
    }

    /// Registry with every built-in channel. Email is registered even
    /// without SMTP settings; its sends are then skipped.
    pub fn builtin(email: Option<EmailConfig>) -> Self {
        Self::builder()
            .register(NOTIFY_CONSOLE, NotificationChannel::Console)
            .register(
                NOTIFY_EMAIL,
                NotificationChannel::Email(email.map(|c| Arc::new(EmailDelivery::new(c)))),
            )
            .register(
                NOTIFY_WEBHOOK,
                NotificationChannel::Webhook(Arc::new(WebhookDelivery::new())),
            )
            .build()
    }

    pub fn get(&self, name: &str) -> Result<&NotificationChannel, EvaluationError> {
        self.channels
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownNotificationType(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Distinct queues used by the registered channels.
    pub fn queues(&self) -> Vec<QueueName> {
        let mut queues: Vec<QueueName> = self.channels.values().map(|c| c.queue()).collect();
        queues.sort();
        queues.dedup();
        queues
    }

    pub fn describe_all(&self) -> Vec<NotificationTypeDescription> {
        self.channels
            .iter()
            .map(|(name, channel)| NotificationTypeDescription {
                name: name.clone(),
                queue: channel.queue(),
                routing_key: channel.queue().routing_key(),
                config: channel.describe(),
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct NotificationRegistryBuilder {
    channels: BTreeMap<String, NotificationChannel>,
}

impl NotificationRegistryBuilder {
    pub fn register(mut self, name: impl Into<String>, channel: NotificationChannel) -> Self {
        self.channels.insert(name.into(), channel);
        self
    }

    pub fn build(self) -> NotificationRegistry {
        NotificationRegistry {
            channels: self.channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn registry() -> NotificationRegistry {
        NotificationRegistry::builtin(None)
    }

    #[test]
    fn channels_route_to_their_queues() {
        let r = registry();
        assert_eq!(r.get(NOTIFY_CONSOLE).unwrap().queue(), QueueName::Default);
        assert_eq!(r.get(NOTIFY_EMAIL).unwrap().queue(), QueueName::NotifyEmail);
        assert_eq!(r.get(NOTIFY_WEBHOOK).unwrap().queue(), QueueName::Default);
        assert_eq!(r.queues(), vec![QueueName::Default, QueueName::NotifyEmail]);
    }

    #[test]
    fn unknown_type_is_reported() {
        assert_matches!(
            registry().get("sms"),
            Err(EvaluationError::UnknownNotificationType(t)) if t == "sms"
        );
    }

    #[test]
    fn describe_all_is_sorted_by_name() {
        let described = registry().describe_all();
        let names: Vec<_> = described.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["console", "email", "webhook"]);
        assert_eq!(described[1].routing_key, "notify.email");
        assert!(described[1].config.get("email").is_some());
    }

    #[test]
    fn config_validation() {
        let r = registry();
        let email = r.get(NOTIFY_EMAIL).unwrap();
        assert!(email.validate_config("email", &json!({"email": "a@b.c"})).is_ok());
        assert_matches!(
            email.validate_config("email", &json!({"email": "  "})),
            Err(EvaluationError::InvalidNotificationConfig { .. })
        );
        assert_matches!(
            r.get(NOTIFY_WEBHOOK).unwrap().validate_config("webhook", &json!({})),
            Err(EvaluationError::InvalidNotificationConfig { notification_type, .. })
                if notification_type == "webhook"
        );
        assert!(r
            .get(NOTIFY_CONSOLE)
            .unwrap()
            .validate_config("console", &json!({}))
            .is_ok());
    }

    #[tokio::test]
    async fn console_always_delivers() {
        let outcome = NotificationChannel::Console
            .send(&json!({"temp": 31}), &json!({}))
            .await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn email_without_smtp_is_skipped() {
        let outcome = NotificationChannel::Email(None)
            .send(&json!({"temp": 31}), &json!({"email": "a@example.com"}))
            .await;
        assert_matches!(outcome, DeliveryOutcome::Skipped(_));
        assert!(!outcome.is_failure());
    }

    #[tokio::test]
    async fn email_without_recipient_is_skipped() {
        let mailer = EmailDelivery::new(EmailConfig {
            smtp_host: "smtp.invalid".into(),
            smtp_port: 587,
            from_address: "noreply@example.com".into(),
            smtp_user: None,
            smtp_password: None,
        });
        let outcome = NotificationChannel::Email(Some(Arc::new(mailer)))
            .send(&json!({"temp": 31}), &json!({}))
            .await;
        assert_matches!(outcome, DeliveryOutcome::Skipped(_));
    }

    #[tokio::test]
    async fn webhook_without_url_is_skipped() {
        let outcome = NotificationChannel::Webhook(Arc::new(WebhookDelivery::new()))
            .send(&json!({}), &json!({}))
            .await;
        assert_matches!(outcome, DeliveryOutcome::Skipped(_));
    }
}
