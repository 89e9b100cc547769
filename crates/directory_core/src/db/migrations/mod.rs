//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically, once per database file.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Migration 2 installs the activity depth/cycle guard triggers; their abort
//!   messages must stay equal to [`DEPTH_GUARD_MESSAGE`] and
//!   [`CYCLE_GUARD_MESSAGE`].

use crate::db::{DbError, DbResult};
use rusqlite::{Connection, TransactionBehavior};

/// Abort message raised by the activity depth guard triggers.
pub const DEPTH_GUARD_MESSAGE: &str = "activity depth limit exceeded";
/// Abort message raised by the activity cycle guard trigger.
pub const CYCLE_GUARD_MESSAGE: &str = "activity hierarchy cycle detected";

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_activity_depth_guard.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// Pending work runs under `BEGIN IMMEDIATE` and the version is read again
/// once the write lock is held, so connections opening the same fresh file
/// concurrently apply each migration exactly once.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    if check_version(conn)? == latest_version() {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current_version = check_version(&tx)?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn check_version(conn: &Connection) -> DbResult<u32> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();
    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }
    Ok(current_version)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
