//! Domain core for triggerflow.
//!
//! Pure logic with no database or network access:
//!
//! - [`operator`] -- comparison operators used by threshold triggers.
//! - [`trigger`] -- trigger evaluators and the immutable [`TriggerRegistry`].
//! - [`rule`] -- the materialized rule model and row grouping.
//! - [`queue`] -- named dispatch queues and their routing keys.
//! - [`secrets`] -- symmetric encryption of source credentials.

pub mod error;
pub mod operator;
pub mod queue;
pub mod rule;
pub mod secrets;
pub mod trigger;
pub mod types;

pub use error::{CoreError, EvaluationError};
pub use operator::Operator;
pub use queue::QueueName;
pub use rule::{assemble_rules, Rule, RuleKey, RuleRow, RuleSet};
pub use secrets::{SecretCipher, SecretError, SourceSecrets};
pub use trigger::{TriggerEvaluator, TriggerRegistry, TriggerTypeDescription};
