//! Activity tree repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist activity nodes as a flat id-referencing table.
//! - Enforce the depth bound and acyclicity on every create/reassign, inside
//!   the write transaction.
//! - Expose the read view used by scope resolution.
//!
//! # Invariants
//! - Every mutation runs under `BEGIN IMMEDIATE`, or joins the caller's open
//!   transaction; validation and write are one atomic unit, and any rejection
//!   rolls the owned transaction back.
//! - Deleting a node removes its whole subtree and the subtree's
//!   organization links; no dangling parent references remain.
//! - Child listing is deterministic: `name ASC, id ASC`.
//! - Storage triggers reject the same violations for writers that bypass this
//!   repository; their aborts are mapped back to typed errors here.

use crate::db::migrations::{CYCLE_GUARD_MESSAGE, DEPTH_GUARD_MESSAGE};
use crate::db::{ensure_schema_ready, DbError, SchemaError, WriteScope};
use crate::model::activity::{ActivityId, ActivityNode, MAX_ACTIVITY_DEPTH};
use crate::repo::parse_uuid;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ACTIVITY_COLUMNS: &[&str] = &["id", "name", "parent_id", "created_at", "updated_at"];
const ACTIVITY_SELECT_SQL: &str = "SELECT
    id,
    name,
    parent_id,
    created_at,
    updated_at
FROM activities";
/// Subtree rooted at `?1`. `UNION` keeps the walk finite on corrupted data.
const SUBTREE_CTE: &str = "WITH RECURSIVE subtree(id) AS (
    SELECT id FROM activities WHERE id = ?1
    UNION
    SELECT child.id
    FROM activities child
    INNER JOIN subtree parent ON child.parent_id = parent.id
)";
/// Upper bound on bound parameters per `IN (...)` lookup.
const CHILD_LOOKUP_CHUNK: usize = 500;

/// Result type used by activity repository operations.
pub type ActivityRepoResult<T> = Result<T, ActivityRepoError>;

/// Errors from activity repository operations.
#[derive(Debug)]
pub enum ActivityRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection does not carry the expected schema.
    Schema(SchemaError),
    /// Target node does not exist.
    NodeNotFound(ActivityId),
    /// Referenced parent node does not exist.
    ParentNotFound(ActivityId),
    /// Write would place a node deeper than `MAX_ACTIVITY_DEPTH`.
    DepthExceeded {
        parent_id: ActivityId,
        attempted_depth: u32,
    },
    /// Reassignment would make a node its own ancestor.
    CycleDetected {
        node_id: ActivityId,
        parent_id: ActivityId,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for ActivityRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "activity not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent activity not found: {id}"),
            Self::DepthExceeded {
                parent_id,
                attempted_depth,
            } => write!(
                f,
                "activity depth {attempted_depth} under parent {parent_id} exceeds maximum {MAX_ACTIVITY_DEPTH}"
            ),
            Self::CycleDetected { node_id, parent_id } => write!(
                f,
                "reassigning activity {node_id} under {parent_id} would create a cycle"
            ),
            Self::InvalidData(message) => write!(f, "invalid activity data: {message}"),
        }
    }
}

impl Error for ActivityRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ActivityRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SchemaError> for ActivityRepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<rusqlite::Error> for ActivityRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read-only view over the activity tree.
///
/// Scope resolution depends on this contract only, never on mutations.
pub trait ActivityReadView {
    /// Loads one node by id.
    fn get_node(&self, node_id: ActivityId) -> ActivityRepoResult<Option<ActivityNode>>;
    /// Lists direct children of one parent, or roots when `parent_id` is `None`.
    fn list_children(&self, parent_id: Option<ActivityId>)
        -> ActivityRepoResult<Vec<ActivityNode>>;
    /// Returns ids of all direct children of any node in `parent_ids`.
    fn child_ids(&self, parent_ids: &[ActivityId]) -> ActivityRepoResult<Vec<ActivityId>>;
    /// Returns node depth (root = 1), capped at `MAX_ACTIVITY_DEPTH + 1`.
    fn depth_of(&self, node_id: ActivityId) -> ActivityRepoResult<Option<u32>>;
}

/// Repository interface for activity tree mutations.
pub trait ActivityRepository: ActivityReadView {
    /// Creates one node under optional parent.
    fn create_node(
        &self,
        name: &str,
        parent_id: Option<ActivityId>,
    ) -> ActivityRepoResult<ActivityNode>;
    /// Moves one node (with its subtree) under another parent or to root.
    fn reassign_parent(
        &self,
        node_id: ActivityId,
        new_parent_id: Option<ActivityId>,
    ) -> ActivityRepoResult<()>;
    /// Deletes one node and its subtree, returning the number of removed nodes.
    fn delete_node(&self, node_id: ActivityId) -> ActivityRepoResult<usize>;
    /// Renames one node.
    fn rename_node(&self, node_id: ActivityId, name: &str) -> ActivityRepoResult<()>;
}

/// SQLite-backed activity repository.
pub struct SqliteActivityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ActivityRepoResult<Self> {
        ensure_schema_ready(conn, &[("activities", ACTIVITY_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl ActivityReadView for SqliteActivityRepository<'_> {
    fn get_node(&self, node_id: ActivityId) -> ActivityRepoResult<Option<ActivityNode>> {
        load_node(self.conn, node_id)
    }

    fn list_children(
        &self,
        parent_id: Option<ActivityId>,
    ) -> ActivityRepoResult<Vec<ActivityNode>> {
        let mut items = Vec::new();
        match parent_id {
            Some(parent_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{ACTIVITY_SELECT_SQL}
                     WHERE parent_id = ?1
                     ORDER BY name ASC, id ASC;"
                ))?;
                let mut rows = stmt.query([parent_id.to_string()])?;
                while let Some(row) = rows.next()? {
                    items.push(parse_activity_row(row)?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "{ACTIVITY_SELECT_SQL}
                     WHERE parent_id IS NULL
                     ORDER BY name ASC, id ASC;"
                ))?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    items.push(parse_activity_row(row)?);
                }
            }
        }
        Ok(items)
    }

    fn child_ids(&self, parent_ids: &[ActivityId]) -> ActivityRepoResult<Vec<ActivityId>> {
        child_ids_of(self.conn, parent_ids)
    }

    fn depth_of(&self, node_id: ActivityId) -> ActivityRepoResult<Option<u32>> {
        depth_of_node(self.conn, node_id)
    }
}

impl ActivityRepository for SqliteActivityRepository<'_> {
    fn create_node(
        &self,
        name: &str,
        parent_id: Option<ActivityId>,
    ) -> ActivityRepoResult<ActivityNode> {
        let tx = WriteScope::begin(self.conn)?;

        if let Some(parent_id) = parent_id {
            let parent_depth =
                depth_of_node(&tx, parent_id)?.ok_or(ActivityRepoError::ParentNotFound(parent_id))?;
            if parent_depth >= MAX_ACTIVITY_DEPTH {
                return Err(ActivityRepoError::DepthExceeded {
                    parent_id,
                    attempted_depth: parent_depth + 1,
                });
            }
        }

        let node_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO activities (id, name, parent_id) VALUES (?1, ?2, ?3);",
            params![
                node_id.to_string(),
                name,
                parent_id.map(|value| value.to_string()),
            ],
        )
        .map_err(|err| map_write_error(err, node_id, parent_id))?;

        let node = load_node(&tx, node_id)?.ok_or(ActivityRepoError::NodeNotFound(node_id))?;
        tx.commit()?;
        Ok(node)
    }

    fn reassign_parent(
        &self,
        node_id: ActivityId,
        new_parent_id: Option<ActivityId>,
    ) -> ActivityRepoResult<()> {
        let tx = WriteScope::begin(self.conn)?;

        if parent_of(&tx, node_id)?.is_none() {
            return Err(ActivityRepoError::NodeNotFound(node_id));
        }

        if let Some(parent_id) = new_parent_id {
            if parent_id == node_id {
                return Err(ActivityRepoError::CycleDetected { node_id, parent_id });
            }

            let parent_depth =
                depth_of_node(&tx, parent_id)?.ok_or(ActivityRepoError::ParentNotFound(parent_id))?;
            if chain_contains(&tx, parent_id, node_id)? {
                return Err(ActivityRepoError::CycleDetected { node_id, parent_id });
            }

            let attempted_depth = parent_depth + subtree_height(&tx, node_id)?;
            if attempted_depth > MAX_ACTIVITY_DEPTH {
                return Err(ActivityRepoError::DepthExceeded {
                    parent_id,
                    attempted_depth,
                });
            }
        }

        tx.execute(
            "UPDATE activities
             SET parent_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                node_id.to_string(),
                new_parent_id.map(|value| value.to_string()),
            ],
        )
        .map_err(|err| map_write_error(err, node_id, new_parent_id))?;

        tx.commit()?;
        Ok(())
    }

    fn delete_node(&self, node_id: ActivityId) -> ActivityRepoResult<usize> {
        let tx = WriteScope::begin(self.conn)?;

        if parent_of(&tx, node_id)?.is_none() {
            return Err(ActivityRepoError::NodeNotFound(node_id));
        }

        // Counted up front: `changes()` does not see rows removed by FK cascade.
        let removed: i64 = tx.query_row(
            &format!("{SUBTREE_CTE} SELECT COUNT(*) FROM subtree;"),
            [node_id.to_string()],
            |row| row.get(0),
        )?;
        tx.execute(
            &format!(
                "{SUBTREE_CTE}
                 DELETE FROM organization_activities
                 WHERE activity_id IN (SELECT id FROM subtree);"
            ),
            [node_id.to_string()],
        )?;
        tx.execute(
            &format!(
                "{SUBTREE_CTE}
                 DELETE FROM activities
                 WHERE id IN (SELECT id FROM subtree);"
            ),
            [node_id.to_string()],
        )?;

        tx.commit()?;
        usize::try_from(removed)
            .map_err(|_| ActivityRepoError::InvalidData(format!("negative subtree size {removed}")))
    }

    fn rename_node(&self, node_id: ActivityId, name: &str) -> ActivityRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE activities
             SET name = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![node_id.to_string(), name],
        )?;
        if changed == 0 {
            return Err(ActivityRepoError::NodeNotFound(node_id));
        }
        Ok(())
    }
}

fn load_node(conn: &Connection, node_id: ActivityId) -> ActivityRepoResult<Option<ActivityNode>> {
    let mut stmt = conn.prepare(&format!("{ACTIVITY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([node_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_activity_row(row)?));
    }
    Ok(None)
}

/// Outer `None`: node missing. Inner `None`: node is a root.
fn parent_of(
    conn: &Connection,
    node_id: ActivityId,
) -> ActivityRepoResult<Option<Option<ActivityId>>> {
    let value: Option<Option<String>> = conn
        .query_row(
            "SELECT parent_id FROM activities WHERE id = ?1;",
            [node_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(text)) => Ok(Some(Some(
            parse_uuid(&text, "activities.parent_id").map_err(ActivityRepoError::InvalidData)?,
        ))),
    }
}

/// Walks the parent chain counting hops; stops once the count passes the
/// bound, so the result is capped at `MAX_ACTIVITY_DEPTH + 1`.
fn depth_of_node(conn: &Connection, node_id: ActivityId) -> ActivityRepoResult<Option<u32>> {
    let Some(mut cursor) = parent_of(conn, node_id)? else {
        return Ok(None);
    };

    let mut depth = 1;
    while let Some(current) = cursor {
        if depth > MAX_ACTIVITY_DEPTH {
            break;
        }
        depth += 1;
        cursor = parent_of(conn, current)?.ok_or_else(|| {
            ActivityRepoError::InvalidData(format!("dangling parent reference to {current}"))
        })?;
    }
    Ok(Some(depth))
}

/// Returns whether `needle` is `start` or one of its ancestors.
fn chain_contains(
    conn: &Connection,
    start: ActivityId,
    needle: ActivityId,
) -> ActivityRepoResult<bool> {
    let mut visited = HashSet::new();
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if current == needle {
            return Ok(true);
        }
        if !visited.insert(current) {
            // Pre-existing loop that does not include `needle`.
            return Ok(false);
        }
        cursor = parent_of(conn, current)?.flatten();
    }
    Ok(false)
}

/// Levels in the subtree rooted at `node_id` (a leaf has height 1), capped at
/// `MAX_ACTIVITY_DEPTH + 1`.
fn subtree_height(conn: &Connection, node_id: ActivityId) -> ActivityRepoResult<u32> {
    let mut height = 1;
    let mut frontier = vec![node_id];
    while height <= MAX_ACTIVITY_DEPTH {
        frontier = child_ids_of(conn, &frontier)?;
        if frontier.is_empty() {
            break;
        }
        height += 1;
    }
    Ok(height)
}

fn child_ids_of(
    conn: &Connection,
    parent_ids: &[ActivityId],
) -> ActivityRepoResult<Vec<ActivityId>> {
    let mut ids = Vec::new();
    for chunk in parent_ids.chunks(CHILD_LOOKUP_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT id
             FROM activities
             WHERE parent_id IN ({placeholders})
             ORDER BY name ASC, id ASC;"
        ))?;
        let bind_values = chunk.iter().map(|id| Value::Text(id.to_string()));
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "activities.id").map_err(ActivityRepoError::InvalidData)?);
        }
    }
    Ok(ids)
}

/// Maps storage guard aborts back to typed errors.
fn map_write_error(
    err: rusqlite::Error,
    node_id: ActivityId,
    parent_id: Option<ActivityId>,
) -> ActivityRepoError {
    let guard_message = match &err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => Some(message.as_str()),
        _ => None,
    };

    match (guard_message, parent_id) {
        (Some(message), Some(parent_id)) if message.contains(DEPTH_GUARD_MESSAGE) => {
            ActivityRepoError::DepthExceeded {
                parent_id,
                attempted_depth: MAX_ACTIVITY_DEPTH + 1,
            }
        }
        (Some(message), Some(parent_id)) if message.contains(CYCLE_GUARD_MESSAGE) => {
            ActivityRepoError::CycleDetected { node_id, parent_id }
        }
        _ => err.into(),
    }
}

fn parse_activity_row(row: &Row<'_>) -> ActivityRepoResult<ActivityNode> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "activities.id").map_err(ActivityRepoError::InvalidData)?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "activities.parent_id"))
        .transpose()
        .map_err(ActivityRepoError::InvalidData)?;

    Ok(ActivityNode {
        id,
        name: row.get("name")?,
        parent_id,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Returns whether a rusqlite error is one of the activity guard aborts.
pub fn is_guard_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message))
            if message.contains(DEPTH_GUARD_MESSAGE) || message.contains(CYCLE_GUARD_MESSAGE)
    )
}
