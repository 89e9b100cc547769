//! Core domain logic for the organization directory.
//! This crate owns the activity hierarchy invariants (depth bound, acyclicity)
//! and the directory queries built on top of them.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod seed;
pub mod service;

pub use config::{ConfigError, DirectoryConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::activity::{ActivityId, ActivityNode, ActivityTree, MAX_ACTIVITY_DEPTH};
pub use model::directory::{
    BoundingBox, Building, BuildingDraft, BuildingId, DirectoryValidationError,
    OrganizationDraft, OrganizationId, OrganizationView,
};
pub use repo::activity_repo::{
    ActivityReadView, ActivityRepoError, ActivityRepository, SqliteActivityRepository,
};
pub use repo::directory_repo::{
    DirectoryRepoError, DirectoryRepository, SqliteDirectoryRepository,
};
pub use seed::{seed_demo_directory, SeedError, SeedSummary};
pub use service::activity_service::{ActivityErrorKind, ActivityService, ActivityServiceError};
pub use service::directory_service::{DirectoryService, DirectoryServiceError};
pub use service::scope_resolver::{resolve_scope, SCOPE_EXPANSION_LEVELS};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
