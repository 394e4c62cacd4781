//! Per-queue dispatch workers.
//!
//! A [`DispatchConsumer`] owns one queue. It claims jobs in FIFO order,
//! hands each to the notification channel named in the job, and acks only
//! after the channel returns. A worker that dies mid-delivery leaves the job
//! claimed until its lease expires, after which another worker redelivers it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use triggerflow_core::queue::QueueName;
use triggerflow_core::types::DbId;
use triggerflow_events::{DeliveryOutcome, NotificationRegistry};

use crate::store::{ClaimedJob, QueueError, TaskQueue};

/// Default lease on a claimed job.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);

/// Default wait between polls of an empty queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct DispatchConsumer {
    queue_name: QueueName,
    queue: Arc<dyn TaskQueue>,
    notifications: Arc<NotificationRegistry>,
    lease: Duration,
    poll_interval: Duration,
}

impl DispatchConsumer {
    pub fn new(
        queue_name: QueueName,
        queue: Arc<dyn TaskQueue>,
        notifications: Arc<NotificationRegistry>,
    ) -> Self {
        Self {
            queue_name,
            queue,
            notifications,
            lease: DEFAULT_LEASE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn queue_name(&self) -> QueueName {
        self.queue_name
    }

    /// Claim and deliver one job. Returns `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<(DbId, DeliveryOutcome)>, QueueError> {
        let Some(job) = self.queue.claim(self.queue_name, self.lease).await? else {
            return Ok(None);
        };

        let outcome = self.deliver(&job).await;
        match &outcome {
            DeliveryOutcome::Delivered => {
                self.queue.ack(job.id).await?;
            }
            DeliveryOutcome::Skipped(reason) => {
                tracing::debug!(job_id = job.id, reason = %reason, "Dispatch job skipped");
                self.queue.ack(job.id).await?;
            }
            DeliveryOutcome::Failed(error) => {
                self.queue.fail(job.id, error).await?;
            }
        }

        Ok(Some((job.id, outcome)))
    }

    async fn deliver(&self, job: &ClaimedJob) -> DeliveryOutcome {
        let channel = match self.notifications.get(&job.notification_type) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Cannot deliver dispatch job");
                return DeliveryOutcome::Failed(e.to_string());
            }
        };

        tracing::debug!(
            job_id = job.id,
            queue = %self.queue_name,
            notification_id = job.notification_id,
            notification_type = %job.notification_type,
            attempt = job.attempts,
            "Delivering notification"
        );
        channel.send(&job.payload, &job.notification_config).await
    }

    /// Drain the queue, then poll every `poll_interval` until `cancel`
    /// fires. A job in flight finishes before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(queue = %self.queue_name, "Dispatch consumer started");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(queue = %self.queue_name, error = %e, "Dispatch queue error");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!(queue = %self.queue_name, "Dispatch consumer stopped");
    }
}
