//! Rule materialization and the in-process rule cache.
//!
//! [`RuleMaterializer`] runs the bulk join once and assembles a
//! [`RuleSet`] snapshot. [`RuleCache`] holds the snapshot currently used
//! for evaluation. A refresh swaps in a new snapshot only on success, so a
//! database outage leaves the previous rules in service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use triggerflow_core::rule::RuleSet;

use crate::store::{RuleSource, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MaterializationError {
    #[error("Rule materialization failed: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// RuleMaterializer
// ---------------------------------------------------------------------------

pub struct RuleMaterializer {
    source: Arc<dyn RuleSource>,
}

impl RuleMaterializer {
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        Self { source }
    }

    /// Recompute every rule from the current data. Idempotent.
    pub async fn materialize(&self) -> Result<RuleSet, MaterializationError> {
        let rows = self.source.load_rule_rows().await?;
        Ok(RuleSet::from_rows(rows, Utc::now()))
    }
}

// ---------------------------------------------------------------------------
// RuleCache
// ---------------------------------------------------------------------------

pub struct RuleCache {
    materializer: RuleMaterializer,
    current: RwLock<Arc<RuleSet>>,
    /// Held for a whole refresh: an older read never replaces a newer one.
    refreshing: Mutex<()>,
}

impl RuleCache {
    /// Create a cache holding an empty snapshot. Call [`refresh`](Self::refresh)
    /// before serving traffic.
    pub fn new(materializer: RuleMaterializer) -> Self {
        Self {
            materializer,
            current: RwLock::new(Arc::new(RuleSet::empty())),
            refreshing: Mutex::new(()),
        }
    }

    /// The snapshot currently in service.
    pub async fn snapshot(&self) -> Arc<RuleSet> {
        self.current.read().await.clone()
    }

    /// Materialize and swap in a new snapshot. On failure the previous
    /// snapshot is kept and the error is returned.
    ///
    /// Concurrent calls run one after another.
    pub async fn refresh(&self) -> Result<Arc<RuleSet>, MaterializationError> {
        let _guard = self.refreshing.lock().await;
        let fresh = Arc::new(self.materializer.materialize().await?);
        *self.current.write().await = fresh.clone();
        tracing::debug!(rules = fresh.len(), "Rule cache refreshed");
        Ok(fresh)
    }

    /// Refresh on a fixed interval until `cancel` fires. The first tick is
    /// immediate.
    pub async fn run(&self, every: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(every);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Rule cache refresher cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.refresh().await {
                        let kept = self.snapshot().await.len();
                        tracing::error!(error = %e, kept_rules = kept, "Rule refresh failed, keeping previous rules");
                    }
                }
            }
        }
    }
}
