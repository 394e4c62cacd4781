//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod catalog;
pub mod dispatch_job;
pub mod notification;
pub mod refresh_token;
pub mod rule;
pub mod source;
pub mod trigger;
pub mod user;
