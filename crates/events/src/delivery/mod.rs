//! External delivery transports used by the notification channels.

pub mod email;
pub mod webhook;
