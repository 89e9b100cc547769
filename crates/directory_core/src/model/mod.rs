//! Domain model for the organization directory.
//!
//! # Responsibility
//! - Define the activity tree node and its bounded depth contract.
//! - Define directory records (buildings, organizations, phones) and the
//!   read models handed to API callers.
//!
//! # Invariants
//! - Every record is identified by a stable UUID assigned on creation.
//! - Activity depth never exceeds [`activity::MAX_ACTIVITY_DEPTH`].

pub mod activity;
pub mod directory;
