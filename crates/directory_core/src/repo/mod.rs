//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Activity mutations validate depth and acyclicity inside the same
//!   `BEGIN IMMEDIATE` transaction as the write.
//! - Repository APIs return semantic errors (`NotFound`, `DepthExceeded`, ...)
//!   in addition to DB transport errors.

use uuid::Uuid;

pub mod activity_repo;
pub mod directory_repo;

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("invalid uuid `{value}` in {column}"))
}
