//! Comparison operators for threshold triggers.
//!
//! The operator set is closed: `<`, `>` and `=`. Tokens outside that set are
//! rejected when parsed, so an [`Operator`] value is always evaluable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;

/// A binary comparison between an observed value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "=")]
    Eq,
}

impl Operator {
    /// Every supported operator, in token order.
    pub const ALL: [Operator; 3] = [Operator::Lt, Operator::Gt, Operator::Eq];

    /// The wire token for this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Eq => "=",
        }
    }

    /// The predicate `(observed, threshold) -> bool` for this operator.
    pub fn predicate(self) -> fn(f64, f64) -> bool {
        match self {
            Operator::Lt => |observed, threshold| observed < threshold,
            Operator::Gt => |observed, threshold| observed > threshold,
            Operator::Eq => |observed, threshold| observed == threshold,
        }
    }

    /// Compare `observed` against `threshold`.
    pub fn apply(self, observed: f64, threshold: f64) -> bool {
        (self.predicate())(observed, threshold)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = EvaluationError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "<" => Ok(Operator::Lt),
            ">" => Ok(Operator::Gt),
            "=" => Ok(Operator::Eq),
            other => Err(EvaluationError::UnknownOperator(other.to_string())),
        }
    }
}
