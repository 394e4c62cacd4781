//! Payload event bus and notification delivery for triggerflow.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub for
//!   [`SourcePayloadEvent`]s, backed by `tokio::sync::broadcast`.
//! - [`delivery`] -- external transports (SMTP email, webhook).
//! - [`channels`] -- the closed set of notification channels and the
//!   immutable [`NotificationRegistry`] that maps type names to them.

pub mod bus;
pub mod channels;
pub mod delivery;

pub use bus::{EventBus, SourcePayloadEvent};
pub use channels::{
    DeliveryOutcome, NotificationChannel, NotificationRegistry, NotificationTypeDescription,
};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::webhook::WebhookDelivery;
