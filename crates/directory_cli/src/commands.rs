//! Subcommand handlers. Each returns the JSON value printed on success.

use crate::{ActivityCommand, BboxArgs, BuildingCommand, OrgCommand};
use directory_core::{
    ActivityRepoError, ActivityService, ActivityServiceError, BoundingBox, BuildingDraft, DbError,
    DirectoryRepoError, DirectoryService, DirectoryServiceError, SeedError,
    SqliteActivityRepository, SqliteDirectoryRepository,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};

/// Failure reported to the user with a stable reason code.
#[derive(Debug)]
pub(crate) struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self {
            code: "invalid_config",
            message: message.into(),
        }
    }

    pub(crate) fn output(err: serde_json::Error) -> Self {
        Self {
            code: "output_error",
            message: err.to_string(),
        }
    }

    pub(crate) fn to_json(&self) -> String {
        json!({ "error_code": self.code, "message": self.message }).to_string()
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self {
            code: "storage_error",
            message: value.to_string(),
        }
    }
}

impl From<ActivityServiceError> for CliError {
    fn from(value: ActivityServiceError) -> Self {
        Self {
            code: value.error_code(),
            message: value.to_string(),
        }
    }
}

impl From<ActivityRepoError> for CliError {
    fn from(value: ActivityRepoError) -> Self {
        ActivityServiceError::from(value).into()
    }
}

impl From<DirectoryServiceError> for CliError {
    fn from(value: DirectoryServiceError) -> Self {
        Self {
            code: value.error_code(),
            message: value.to_string(),
        }
    }
}

impl From<DirectoryRepoError> for CliError {
    fn from(value: DirectoryRepoError) -> Self {
        DirectoryServiceError::from(value).into()
    }
}

impl From<SeedError> for CliError {
    fn from(value: SeedError) -> Self {
        Self {
            code: "seed_failed",
            message: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::output(value)
    }
}

type CommandResult = Result<Value, CliError>;

pub(crate) fn seed(conn: &Connection) -> CommandResult {
    let summary = directory_core::seed_demo_directory(conn)?;
    Ok(serde_json::to_value(summary)?)
}

pub(crate) fn activity(conn: &Connection, command: ActivityCommand) -> CommandResult {
    let service = ActivityService::new(SqliteActivityRepository::try_new(conn)?);
    let value = match command {
        ActivityCommand::Add { name, parent } => {
            serde_json::to_value(service.create_node(name, parent)?)?
        }
        ActivityCommand::Move { id, parent } => {
            service.reassign_parent(id, parent)?;
            serde_json::to_value(service.get_node(id)?)?
        }
        ActivityCommand::Delete { id } => {
            let removed = service.delete_node(id)?;
            json!({ "id": id, "removed": removed })
        }
        ActivityCommand::Children { parent } => {
            serde_json::to_value(service.list_children(parent)?)?
        }
        ActivityCommand::Tree { id: Some(id) } => serde_json::to_value(service.subtree(id)?)?,
        ActivityCommand::Tree { id: None } => serde_json::to_value(service.forest()?)?,
        ActivityCommand::Scope { id } => {
            let mut ids: Vec<_> = service.resolve_scope(id)?.into_iter().collect();
            ids.sort();
            json!({ "id": id, "scope": ids })
        }
    };
    Ok(value)
}

pub(crate) fn building(conn: &Connection, command: BuildingCommand) -> CommandResult {
    let service = directory_service(conn)?;
    let value = match command {
        BuildingCommand::Add { address, lat, lon } => {
            serde_json::to_value(service.create_building(&BuildingDraft::new(address, lat, lon))?)?
        }
        BuildingCommand::List => serde_json::to_value(service.list_buildings()?)?,
    };
    Ok(value)
}

pub(crate) fn org(conn: &Connection, command: OrgCommand) -> CommandResult {
    let service = directory_service(conn)?;
    let value = match command {
        OrgCommand::Get { id } => serde_json::to_value(service.get_organization(id)?)?,
        OrgCommand::Search { query } => {
            serde_json::to_value(service.search_organizations_by_name(&query)?)?
        }
        OrgCommand::Building { id } => {
            serde_json::to_value(service.organizations_in_building(id)?)?
        }
        OrgCommand::Activity { id } => {
            serde_json::to_value(service.organizations_by_activity(id)?)?
        }
        OrgCommand::Bbox(BboxArgs {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }) => serde_json::to_value(service.organizations_in_bbox(&BoundingBox {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        })?)?,
    };
    Ok(value)
}

fn directory_service(
    conn: &Connection,
) -> Result<DirectoryService<SqliteDirectoryRepository<'_>, SqliteActivityRepository<'_>>, CliError>
{
    Ok(DirectoryService::new(
        SqliteDirectoryRepository::try_new(conn)?,
        SqliteActivityRepository::try_new(conn)?,
    ))
}
