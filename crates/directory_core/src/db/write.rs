//! Write transaction scope shared by repository mutations.
//!
//! # Invariants
//! - On an idle connection a scope owns a `BEGIN IMMEDIATE` transaction that
//!   rolls back unless committed.
//! - Inside a caller's transaction a scope joins it; commit and rollback stay
//!   with the caller, which must abort on any error it receives.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::ops::Deref;

pub(crate) enum WriteScope<'conn> {
    Owned(Transaction<'conn>),
    Joined(&'conn Connection),
}

impl<'conn> WriteScope<'conn> {
    pub(crate) fn begin(conn: &'conn Connection) -> rusqlite::Result<Self> {
        if conn.is_autocommit() {
            Ok(Self::Owned(Transaction::new_unchecked(
                conn,
                TransactionBehavior::Immediate,
            )?))
        } else {
            Ok(Self::Joined(conn))
        }
    }

    pub(crate) fn commit(self) -> rusqlite::Result<()> {
        match self {
            Self::Owned(tx) => tx.commit(),
            Self::Joined(_) => Ok(()),
        }
    }
}

impl Deref for WriteScope<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Owned(tx) => tx,
            Self::Joined(conn) => conn,
        }
    }
}
