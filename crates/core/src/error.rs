use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure evaluating one rule or routing one notification.
///
/// Every variant is local to a single rule or notification: callers log it,
/// record the skip, and move on to the next sibling.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// A trigger's stored config does not match its evaluator's schema.
    #[error("Invalid parameters for trigger type '{trigger_type}': {reason}")]
    InvalidParameters {
        trigger_type: String,
        reason: String,
    },

    /// The incoming payload lacks a field the evaluator reads.
    #[error("Payload is missing field '{0}'")]
    MissingPayloadField(String),

    /// The payload field exists but has the wrong shape (e.g. a string
    /// where a number is expected).
    #[error("Payload field '{field}' is malformed: {reason}")]
    MalformedPayloadField { field: String, reason: String },

    #[error("Unknown comparison operator '{0}'")]
    UnknownOperator(String),

    #[error("Unknown trigger type '{0}'")]
    UnknownTriggerType(String),

    #[error("Unknown notification type '{0}'")]
    UnknownNotificationType(String),

    /// A notification's delivery config lacks a key its channel requires.
    #[error("Invalid config for notification type '{notification_type}': {reason}")]
    InvalidNotificationConfig {
        notification_type: String,
        reason: String,
    },
}
