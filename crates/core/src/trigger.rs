//! Trigger evaluators and the trigger type registry.
//!
//! A [`TriggerEvaluator`] is a pure predicate over an incoming payload and a
//! trigger's stored parameters. The [`TriggerRegistry`] maps trigger type
//! names (as stored in the `trigger_types` table) to evaluators. It is built
//! once at startup and never mutated afterwards, so it can be shared across
//! tasks behind an `Arc` without locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::EvaluationError;
use crate::operator::Operator;

/// Registry name of the temperature threshold trigger.
pub const TRIGGER_TEMPERATURE: &str = "temperature";

/// Payload field read by the temperature trigger.
const TEMPERATURE_FIELD: &str = "temp";

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters of a temperature trigger, e.g. `{"temp": 30, "op": "<"}`.
/// Other keys in the stored config are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureParams {
    /// Threshold in the source's units (metric by default).
    pub temp: f64,
    pub op: Operator,
}

// ---------------------------------------------------------------------------
// TriggerEvaluator
// ---------------------------------------------------------------------------

/// Closed set of trigger kinds.
///
/// New kinds are added as a variant here and registered under a name in
/// [`TriggerRegistry::builtin`]; nothing else in the system branches on the
/// trigger type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvaluator {
    /// Compares `payload.temp` against `params.temp` with `params.op`.
    Temperature,
}

impl TriggerEvaluator {
    /// Evaluate the trigger against a payload.
    ///
    /// Validates `params` first, so a malformed trigger config is reported
    /// as [`EvaluationError::InvalidParameters`] regardless of the payload.
    pub fn evaluate(&self, payload: &Value, params: &Value) -> Result<bool, EvaluationError> {
        match self {
            TriggerEvaluator::Temperature => {
                let params: TemperatureParams = parse_params(TRIGGER_TEMPERATURE, params)?;
                let observed = read_number(payload, TEMPERATURE_FIELD)?;
                Ok(params.op.apply(observed, params.temp))
            }
        }
    }

    /// Check `params` against the trigger's schema without a payload.
    pub fn validate_params(&self, params: &Value) -> Result<(), EvaluationError> {
        match self {
            TriggerEvaluator::Temperature => {
                parse_params::<TemperatureParams>(TRIGGER_TEMPERATURE, params).map(|_| ())
            }
        }
    }

    /// Human-readable description of the parameters this trigger accepts.
    pub fn describe(&self) -> Value {
        match self {
            TriggerEvaluator::Temperature => json!({
                "temp": "Number: threshold temperature in degrees",
                "op": "Comparison operator applied as `current <op> temp`: one of <, >, =",
            }),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    trigger_type: &str,
    params: &Value,
) -> Result<T, EvaluationError> {
    T::deserialize(params).map_err(|e| EvaluationError::InvalidParameters {
        trigger_type: trigger_type.to_string(),
        reason: e.to_string(),
    })
}

fn read_number(payload: &Value, field: &str) -> Result<f64, EvaluationError> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(EvaluationError::MissingPayloadField(field.to_string())),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| EvaluationError::MalformedPayloadField {
                field: field.to_string(),
                reason: format!("expected a number, got {value}"),
            }),
    }
}

// ---------------------------------------------------------------------------
// TriggerRegistry
// ---------------------------------------------------------------------------

/// Discovery entry returned by [`TriggerRegistry::describe_all`].
#[derive(Debug, Clone, Serialize)]
pub struct TriggerTypeDescription {
    pub name: String,
    pub params: Value,
}

/// Immutable mapping from trigger type name to evaluator.
#[derive(Debug, Clone)]
pub struct TriggerRegistry {
    evaluators: BTreeMap<String, TriggerEvaluator>,
}

impl TriggerRegistry {
    /// Start building a registry with no evaluators.
    pub fn builder() -> TriggerRegistryBuilder {
        TriggerRegistryBuilder::default()
    }

    /// Registry containing every built-in trigger kind.
    pub fn builtin() -> Self {
        Self::builder()
            .register(TRIGGER_TEMPERATURE, TriggerEvaluator::Temperature)
            .build()
    }

    /// Look up the evaluator registered under `name`.
    pub fn get(&self, name: &str) -> Result<&TriggerEvaluator, EvaluationError> {
        self.evaluators
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownTriggerType(name.to_string()))
    }

    /// Resolve `trigger_type` and evaluate it against `payload`.
    pub fn evaluate(
        &self,
        trigger_type: &str,
        payload: &Value,
        params: &Value,
    ) -> Result<bool, EvaluationError> {
        self.get(trigger_type)?.evaluate(payload, params)
    }

    /// Resolve `trigger_type` and validate `params` for it.
    pub fn validate(&self, trigger_type: &str, params: &Value) -> Result<(), EvaluationError> {
        self.get(trigger_type)?.validate_params(params)
    }

    /// Registered type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.evaluators.keys().map(String::as_str)
    }

    /// Describe every registered trigger type, sorted by name.
    pub fn describe_all(&self) -> Vec<TriggerTypeDescription> {
        self.evaluators
            .iter()
            .map(|(name, evaluator)| TriggerTypeDescription {
                name: name.clone(),
                params: evaluator.describe(),
            })
            .collect()
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Builder for [`TriggerRegistry`]. Registering a name twice keeps the last
/// evaluator.
#[derive(Debug, Default)]
pub struct TriggerRegistryBuilder {
    evaluators: BTreeMap<String, TriggerEvaluator>,
}

impl TriggerRegistryBuilder {
    pub fn register(mut self, name: impl Into<String>, evaluator: TriggerEvaluator) -> Self {
        self.evaluators.insert(name.into(), evaluator);
        self
    }

    pub fn build(self) -> TriggerRegistry {
        TriggerRegistry {
            evaluators: self.evaluators,
        }
    }
}
