//! Trigger evaluation and dispatch.
//!
//! For every payload event the [`RuleEngine`] looks up the cached rules of
//! the event's source, evaluates each rule's trigger and, on a match,
//! enqueues one dispatch job per notification on the queue owned by the
//! notification's type.
//!
//! Failures are contained: a rule whose trigger cannot be evaluated is
//! skipped, a notification that cannot be resolved or enqueued is skipped,
//! and neither stops the siblings. Every skip is logged and recorded in the
//! returned [`EvaluationReport`].

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use triggerflow_core::queue::QueueName;
use triggerflow_core::rule::{Rule, RuleKey};
use triggerflow_core::trigger::TriggerRegistry;
use triggerflow_core::types::DbId;
use triggerflow_events::{NotificationRegistry, SourcePayloadEvent};

use crate::materializer::RuleCache;
use crate::store::{DispatchRequest, NotificationDirectory, TaskQueue};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of evaluating one payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub source_id: DbId,
    /// Rules whose trigger was evaluated (matched or not).
    pub evaluated: usize,
    pub matched: Vec<RuleKey>,
    pub dispatched: Vec<DispatchRecord>,
    pub skipped_rules: Vec<SkippedRule>,
    pub skipped_notifications: Vec<SkippedNotification>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub rule: RuleKey,
    pub notification_id: DbId,
    pub queue: QueueName,
    pub job_id: DbId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRule {
    pub rule: RuleKey,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedNotification {
    pub rule: RuleKey,
    pub notification_id: DbId,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// RuleEngine
// ---------------------------------------------------------------------------

pub struct RuleEngine {
    rules: Arc<RuleCache>,
    triggers: Arc<TriggerRegistry>,
    notifications: Arc<NotificationRegistry>,
    directory: Arc<dyn NotificationDirectory>,
    queue: Arc<dyn TaskQueue>,
}

impl RuleEngine {
    pub fn new(
        rules: Arc<RuleCache>,
        triggers: Arc<TriggerRegistry>,
        notifications: Arc<NotificationRegistry>,
        directory: Arc<dyn NotificationDirectory>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            rules,
            triggers,
            notifications,
            directory,
            queue,
        }
    }

    /// Evaluate `payload` against every cached rule of `source_id`.
    ///
    /// Never fails: every per-rule and per-notification error ends up in the
    /// report.
    pub async fn process(&self, source_id: DbId, payload: &Value) -> EvaluationReport {
        let snapshot = self.rules.snapshot().await;
        let mut report = EvaluationReport {
            source_id,
            ..Default::default()
        };

        for rule in snapshot.for_source(source_id) {
            report.evaluated += 1;
            match self
                .triggers
                .evaluate(&rule.trigger_type, payload, &rule.trigger_params)
            {
                Ok(false) => {}
                Ok(true) => {
                    tracing::debug!(
                        user_id = rule.user_id,
                        source_id,
                        trigger_id = rule.trigger_id,
                        notifications = rule.notification_ids.len(),
                        "Trigger matched"
                    );
                    report.matched.push(rule.key());
                    self.dispatch(rule, payload, &mut report).await;
                }
                Err(e) => {
                    tracing::warn!(
                        source_id,
                        trigger_id = rule.trigger_id,
                        trigger_type = %rule.trigger_type,
                        error = %e,
                        "Skipping rule"
                    );
                    report.skipped_rules.push(SkippedRule {
                        rule: rule.key(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.matched.is_empty() {
            tracing::info!(
                source_id,
                evaluated = report.evaluated,
                matched = report.matched.len(),
                dispatched = report.dispatched.len(),
                skipped_rules = report.skipped_rules.len(),
                skipped_notifications = report.skipped_notifications.len(),
                "Payload evaluated"
            );
        }

        report
    }

    /// Enqueue one job per notification of a matched rule.
    async fn dispatch(&self, rule: &Rule, payload: &Value, report: &mut EvaluationReport) {
        let key = rule.key();

        for &notification_id in &rule.notification_ids {
            match self.prepare(rule, notification_id, payload).await {
                Ok(request) => match self.queue.enqueue(&request).await {
                    Ok(job_id) => report.dispatched.push(DispatchRecord {
                        rule: key,
                        notification_id,
                        queue: request.queue,
                        job_id,
                    }),
                    Err(e) => {
                        tracing::error!(notification_id, error = %e, "Failed to enqueue dispatch job");
                        report.skipped_notifications.push(SkippedNotification {
                            rule: key,
                            notification_id,
                            reason: e.to_string(),
                        });
                    }
                },
                Err(reason) => {
                    tracing::warn!(notification_id, reason = %reason, "Skipping notification");
                    report.skipped_notifications.push(SkippedNotification {
                        rule: key,
                        notification_id,
                        reason,
                    });
                }
            }
        }
    }

    /// Resolve a notification into a dispatch request, or the reason it
    /// cannot be sent.
    async fn prepare(
        &self,
        rule: &Rule,
        notification_id: DbId,
        payload: &Value,
    ) -> Result<DispatchRequest, String> {
        let target = self
            .directory
            .find_target(notification_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "notification no longer exists".to_string())?;

        if !target.is_active {
            return Err("notification is inactive".into());
        }
        if target.user_id != rule.user_id {
            return Err("notification belongs to another user".into());
        }

        let channel = self
            .notifications
            .get(&target.notification_type)
            .map_err(|e| e.to_string())?;

        Ok(DispatchRequest {
            queue: channel.queue(),
            rule: rule.key(),
            notification_id,
            notification_type: target.notification_type,
            notification_config: target.config,
            payload: payload.clone(),
        })
    }

    /// Consume payload events until the bus is closed.
    pub async fn run(self: Arc<Self>, mut receiver: broadcast::Receiver<SourcePayloadEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.process(event.source_id, &event.payload).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Rule engine lagged, payloads dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, rule engine shutting down");
                    break;
                }
            }
        }
    }
}
