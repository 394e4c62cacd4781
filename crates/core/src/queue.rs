//! Named dispatch queues.
//!
//! Each notification type is bound to exactly one queue so a slow channel
//! (SMTP) cannot starve the others. The names and routing keys are stored on
//! every dispatch job row and used by consumers to claim work.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Exchange for the general-purpose queue.
pub const EXCHANGE_DEFAULT: &str = "default";
/// Direct exchange shared by the per-channel notification queues.
pub const EXCHANGE_NOTIFY: &str = "notify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Default,
    NotifyEmail,
    NotifyTg,
    NotifySms,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::Default,
        QueueName::NotifyEmail,
        QueueName::NotifyTg,
        QueueName::NotifySms,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Default => "default",
            QueueName::NotifyEmail => "notify_email",
            QueueName::NotifyTg => "notify_tg",
            QueueName::NotifySms => "notify_sms",
        }
    }

    pub fn routing_key(self) -> &'static str {
        match self {
            QueueName::Default => "default",
            QueueName::NotifyEmail => "notify.email",
            QueueName::NotifyTg => "notify.tg",
            QueueName::NotifySms => "notify.sms",
        }
    }

    pub fn exchange(self) -> &'static str {
        match self {
            QueueName::Default => EXCHANGE_DEFAULT,
            _ => EXCHANGE_NOTIFY,
        }
    }

    /// Parse a comma separated list such as `"default,notify_email"`.
    ///
    /// Blank entries are ignored; duplicates are collapsed. An empty input
    /// yields every queue.
    pub fn parse_list(input: &str) -> Result<Vec<QueueName>, CoreError> {
        let mut queues: Vec<QueueName> = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()?;
        if queues.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        queues.sort();
        queues.dedup();
        Ok(queues)
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown queue '{s}'")))
    }
}
