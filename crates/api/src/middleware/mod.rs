//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the user behind a JWT Bearer token.
//! - [`rbac::RequireSuperuser`] -- rejects non-superusers with 403.

pub mod auth;
pub mod rbac;
