//! Rule materialization, trigger evaluation and dispatch.
//!
//! - [`materializer`] -- builds [`RuleSet`](triggerflow_core::RuleSet)
//!   snapshots and keeps the current one in a [`RuleCache`].
//! - [`engine`] -- evaluates payload events against cached rules and
//!   enqueues one dispatch job per matched notification.
//! - [`consumer`] -- per-queue workers that claim jobs and call the
//!   notification channel.
//! - [`ingest`] -- pollers that turn external data into payload events.
//! - [`store`] -- the persistence and queue seams, with Postgres impls.

pub mod consumer;
pub mod engine;
pub mod ingest;
pub mod materializer;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use consumer::DispatchConsumer;
pub use engine::{EvaluationReport, RuleEngine};
pub use ingest::{IngestError, OpenWeatherClient, WeatherPoller};
pub use materializer::{MaterializationError, RuleCache, RuleMaterializer};
pub use store::{
    ClaimedJob, DispatchRequest, NotificationDirectory, NotificationTarget, PgStore, QueueError,
    RuleSource, StoreError, TaskQueue,
};
