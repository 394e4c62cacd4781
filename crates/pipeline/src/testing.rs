//! In-memory fakes of the store seams.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use triggerflow_core::queue::QueueName;
use triggerflow_core::rule::RuleRow;
use triggerflow_core::types::DbId;

use crate::store::{
    ClaimedJob, DispatchRequest, NotificationDirectory, NotificationTarget, QueueError,
    RuleSource, StoreError, TaskQueue,
};

pub fn rule_row(
    user_id: DbId,
    source_id: DbId,
    trigger_id: DbId,
    params: Value,
    notification_id: Option<DbId>,
) -> RuleRow {
    RuleRow {
        user_id,
        source_id,
        trigger_id,
        trigger_type: "temperature".into(),
        trigger_params: params,
        notification_id,
    }
}

// ---------------------------------------------------------------------------
// FakeRuleSource
// ---------------------------------------------------------------------------

/// Returns the configured rows, or fails while `fail` is set.
///
/// Rows are read when a load starts; the optional delay is applied before
/// the load returns.
#[derive(Default)]
pub struct FakeRuleSource {
    rows: Mutex<Vec<RuleRow>>,
    fail: Mutex<bool>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRuleSource {
    pub fn new(rows: Vec<RuleRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Highest number of loads that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_rows(&self, rows: Vec<RuleRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl RuleSource for FakeRuleSource {
    async fn load_rule_rows(&self) -> Result<Vec<RuleRow>, StoreError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let result = if *self.fail.lock().unwrap() {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(self.rows.lock().unwrap().clone())
        };
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// FakeDirectory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDirectory {
    targets: HashMap<DbId, NotificationTarget>,
    broken: HashSet<DbId>,
}

impl FakeDirectory {
    pub fn with(mut self, id: DbId, user_id: DbId, notification_type: &str, active: bool) -> Self {
        self.targets.insert(
            id,
            NotificationTarget {
                id,
                user_id,
                notification_type: notification_type.to_string(),
                config: json!({"email": format!("user{user_id}@example.com")}),
                is_active: active,
            },
        );
        self
    }

    /// Lookups of `id` fail with a store error.
    pub fn broken(mut self, id: DbId) -> Self {
        self.broken.insert(id);
        self
    }
}

#[async_trait]
impl NotificationDirectory for FakeDirectory {
    async fn find_target(&self, id: DbId) -> Result<Option<NotificationTarget>, StoreError> {
        if self.broken.contains(&id) {
            return Err(StoreError::Unavailable(format!("lookup of {id} failed")));
        }
        Ok(self.targets.get(&id).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Claimed,
    Done,
    Failed(String),
}

/// FIFO queue per name. Enqueues for notifications in `reject` fail.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<MemoryQueueInner>,
    reject: HashSet<DbId>,
}

#[derive(Default)]
struct MemoryQueueInner {
    next_id: DbId,
    requests: Vec<(DbId, DispatchRequest)>,
    pending: HashMap<QueueName, VecDeque<DbId>>,
    states: HashMap<DbId, JobState>,
    attempts: HashMap<DbId, i32>,
}

impl MemoryQueue {
    pub fn rejecting(ids: impl IntoIterator<Item = DbId>) -> Self {
        Self {
            reject: ids.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.inner
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn state(&self, job_id: DbId) -> Option<JobState> {
        self.inner.lock().unwrap().states.get(&job_id).cloned()
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, request: &DispatchRequest) -> Result<DbId, QueueError> {
        if self.reject.contains(&request.notification_id) {
            return Err(QueueError::Enqueue {
                queue: request.queue,
                source: StoreError::Unavailable("broker down".into()),
            });
        }
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.requests.push((id, request.clone()));
        inner.pending.entry(request.queue).or_default().push_back(id);
        inner.states.insert(id, JobState::Pending);
        Ok(id)
    }

    async fn claim(
        &self,
        queue: QueueName,
        _lease: Duration,
    ) -> Result<Option<ClaimedJob>, QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(id) = inner.pending.get_mut(&queue).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        inner.states.insert(id, JobState::Claimed);
        let attempts = {
            let a = inner.attempts.entry(id).or_insert(0);
            *a += 1;
            *a
        };
        let request = inner
            .requests
            .iter()
            .find(|(job_id, _)| *job_id == id)
            .map(|(_, r)| r.clone())
            .ok_or_else(|| QueueError::Store(StoreError::Unavailable("lost job".into())))?;
        Ok(Some(ClaimedJob {
            id,
            queue,
            notification_id: request.notification_id,
            notification_type: request.notification_type,
            notification_config: request.notification_config,
            payload: request.payload,
            attempts,
        }))
    }

    async fn ack(&self, job_id: DbId) -> Result<(), QueueError> {
        self.inner.lock().unwrap().states.insert(job_id, JobState::Done);
        Ok(())
    }

    async fn fail(&self, job_id: DbId, error: &str) -> Result<(), QueueError> {
        self.inner
            .lock()
            .unwrap()
            .states
            .insert(job_id, JobState::Failed(error.to_string()));
        Ok(())
    }
}
