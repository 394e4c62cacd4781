//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Owner-scoped methods take
//! `owner: Option<DbId>`; `None` means unscoped (superuser or internal
//! callers), `Some(id)` restricts to rows owned by `id`.

pub mod catalog_repo;
pub mod dispatch_job_repo;
pub mod notification_repo;
pub mod refresh_token_repo;
pub mod rule_repo;
pub mod source_repo;
pub mod trigger_repo;
pub mod user_repo;

pub use catalog_repo::CatalogRepo;
pub use dispatch_job_repo::DispatchJobRepo;
pub use notification_repo::NotificationRepo;
pub use refresh_token_repo::RefreshTokenRepo;
pub use rule_repo::RuleRepo;
pub use source_repo::SourceRepo;
pub use trigger_repo::TriggerRepo;
pub use user_repo::UserRepo;
