//! Demo dataset loader.
//!
//! Replaces every directory row with a small fixed dataset: three buildings,
//! two activity trees plus one standalone root, and three organizations.
//! Clearing and loading share one transaction; a failed run leaves the
//! previous rows in place.

use crate::db::WriteScope;
use crate::model::directory::{BuildingDraft, OrganizationDraft};
use crate::repo::activity_repo::{ActivityRepoError, SqliteActivityRepository};
use crate::repo::directory_repo::{DirectoryRepoError, SqliteDirectoryRepository};
use crate::service::activity_service::{ActivityService, ActivityServiceError};
use crate::service::directory_service::{DirectoryService, DirectoryServiceError};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Row counts written by one seed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub buildings: usize,
    pub activities: usize,
    pub organizations: usize,
}

#[derive(Debug)]
pub enum SeedError {
    Sqlite(rusqlite::Error),
    Activity(ActivityServiceError),
    Directory(DirectoryServiceError),
}

impl Display for SeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "seed transaction failed: {err}"),
            Self::Activity(err) => write!(f, "failed to seed activities: {err}"),
            Self::Directory(err) => write!(f, "failed to seed directory: {err}"),
        }
    }
}

impl Error for SeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Activity(err) => Some(err),
            Self::Directory(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for SeedError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<ActivityServiceError> for SeedError {
    fn from(value: ActivityServiceError) -> Self {
        Self::Activity(value)
    }
}

impl From<ActivityRepoError> for SeedError {
    fn from(value: ActivityRepoError) -> Self {
        Self::Activity(value.into())
    }
}

impl From<DirectoryServiceError> for SeedError {
    fn from(value: DirectoryServiceError) -> Self {
        Self::Directory(value)
    }
}

impl From<DirectoryRepoError> for SeedError {
    fn from(value: DirectoryRepoError) -> Self {
        Self::Directory(value.into())
    }
}

/// Clears the directory and loads the demo dataset.
pub fn seed_demo_directory(conn: &Connection) -> Result<SeedSummary, SeedError> {
    let tx = WriteScope::begin(conn)?;
    clear_directory(&tx)?;
    let summary = load_demo_rows(&tx)?;
    tx.commit()?;

    info!(
        "event=seed_demo module=seed status=ok buildings={} activities={} organizations={}",
        summary.buildings, summary.activities, summary.organizations
    );
    Ok(summary)
}

fn load_demo_rows(conn: &Connection) -> Result<SeedSummary, SeedError> {
    let activities = ActivityService::new(SqliteActivityRepository::try_new(conn)?);
    let directory = DirectoryService::new(
        SqliteDirectoryRepository::try_new(conn)?,
        SqliteActivityRepository::try_new(conn)?,
    );

    let lenina = directory.create_building(&BuildingDraft::new(
        "Moscow, Lenina 1",
        55.7558,
        37.6173,
    ))?;
    let tverskaya = directory.create_building(&BuildingDraft::new(
        "Moscow, Tverskaya 12",
        55.7600,
        37.6000,
    ))?;
    let nevsky = directory.create_building(&BuildingDraft::new(
        "Saint Petersburg, Nevsky 20",
        59.9343,
        30.3351,
    ))?;

    let food = activities.create_node("Food", None)?;
    let meat = activities.create_node("Meat Products", Some(food.id))?;
    let sausages = activities.create_node("Sausages", Some(meat.id))?;
    activities.create_node("Dairy Products", Some(food.id))?;
    let automotive = activities.create_node("Automotive", None)?;
    let parts = activities.create_node("Spare Parts", Some(automotive.id))?;
    let tires = activities.create_node("Tires", Some(parts.id))?;
    let it = activities.create_node("IT Services", None)?;

    let organizations = [
        OrganizationDraft::new("Sausage King", lenina.id)
            .with_activities([sausages.id, meat.id])
            .with_phones(["8-800-555-35-35", "8-495-123-45-67"]),
        OrganizationDraft::new("AutoFix", tverskaya.id).with_activities([parts.id, tires.id]),
        OrganizationDraft::new("SoftDev", nevsky.id)
            .with_activities([it.id])
            .with_phones(["8-812-987-65-43"]),
    ];
    for draft in &organizations {
        directory.create_organization(draft)?;
    }

    Ok(SeedSummary {
        buildings: 3,
        activities: 8,
        organizations: organizations.len(),
    })
}

fn clear_directory(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DELETE FROM phones;
         DELETE FROM organization_activities;
         DELETE FROM organizations;
         DELETE FROM buildings;
         DELETE FROM activities;",
    )
}

#[cfg(test)]
mod tests {
    use super::{seed_demo_directory, SeedError};
    use crate::db::open_db_in_memory;

    fn count(conn: &rusqlite::Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn seeding_twice_replaces_rows() {
        let conn = open_db_in_memory().unwrap();
        seed_demo_directory(&conn).unwrap();
        let summary = seed_demo_directory(&conn).unwrap();

        assert_eq!(count(&conn, "buildings"), summary.buildings as i64);
        assert_eq!(count(&conn, "activities"), summary.activities as i64);
        assert_eq!(count(&conn, "organizations"), summary.organizations as i64);
        assert_eq!(count(&conn, "phones"), 3);
        assert_eq!(count(&conn, "organization_activities"), 5);
    }

    #[test]
    fn failed_reseed_keeps_previous_rows() {
        let conn = open_db_in_memory().unwrap();
        let first = seed_demo_directory(&conn).unwrap();
        let names_before: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM activities ORDER BY name;")
                .unwrap();
            let rows = stmt.query_map([], |row| row.get(0)).unwrap();
            rows.collect::<Result<_, _>>().unwrap()
        };

        conn.execute_batch(
            "CREATE TRIGGER block_organizations BEFORE INSERT ON organizations
             BEGIN
                 SELECT RAISE(ABORT, 'organizations are read-only');
             END;",
        )
        .unwrap();
        let err = seed_demo_directory(&conn).unwrap_err();
        assert!(matches!(err, SeedError::Directory(_)));
        assert!(conn.is_autocommit());

        assert_eq!(count(&conn, "buildings"), first.buildings as i64);
        assert_eq!(count(&conn, "activities"), first.activities as i64);
        assert_eq!(count(&conn, "organizations"), first.organizations as i64);
        assert_eq!(count(&conn, "phones"), 3);
        let names_after: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM activities ORDER BY name;")
                .unwrap();
            let rows = stmt.query_map([], |row| row.get(0)).unwrap();
            rows.collect::<Result<_, _>>().unwrap()
        };
        assert_eq!(names_after, names_before);
    }

    #[test]
    fn seed_joins_an_open_transaction() {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch("BEGIN IMMEDIATE;").unwrap();
        seed_demo_directory(&conn).unwrap();
        assert!(!conn.is_autocommit());
        conn.execute_batch("ROLLBACK;").unwrap();

        assert_eq!(count(&conn, "organizations"), 0);
    }
}
