//! Directory repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist buildings, organizations, phones and organization↔activity links.
//! - Assemble `OrganizationView` read models.
//! - Answer directory queries, including scope-set filtered lookups.
//!
//! # Invariants
//! - Drafts are validated by the caller; this layer only checks references.
//! - Organization creation inserts row, links and phones in one transaction.
//! - Listing order is deterministic: `name ASC, id ASC`.
//! - Name search folds case with Rust's Unicode lowering on both sides, via
//!   the `unicode_lower` SQL function registered at connection open.

use crate::db::{ensure_schema_ready, DbError, SchemaError, WriteScope};
use crate::model::activity::ActivityId;
use crate::model::directory::{
    ActivityRef, BoundingBox, Building, BuildingDraft, BuildingId, OrganizationDraft,
    OrganizationId, OrganizationView, Phone,
};
use crate::repo::parse_uuid;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const BUILDING_COLUMNS: &[&str] = &["id", "address", "latitude", "longitude"];
const ORGANIZATION_COLUMNS: &[&str] = &["id", "name", "building_id"];
const ORGANIZATION_ACTIVITY_COLUMNS: &[&str] = &["organization_id", "activity_id"];
const PHONE_COLUMNS: &[&str] = &["id", "organization_id", "number"];
const SCOPE_LOOKUP_CHUNK: usize = 500;

pub type DirectoryRepoResult<T> = Result<T, DirectoryRepoError>;

/// Errors from directory repository operations.
#[derive(Debug)]
pub enum DirectoryRepoError {
    Db(DbError),
    Schema(SchemaError),
    BuildingNotFound(BuildingId),
    OrganizationNotFound(OrganizationId),
    /// Organization draft references a missing activity.
    ActivityNotFound(ActivityId),
    InvalidData(String),
}

impl Display for DirectoryRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::BuildingNotFound(id) => write!(f, "building not found: {id}"),
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::ActivityNotFound(id) => write!(f, "activity not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid directory data: {message}"),
        }
    }
}

impl Error for DirectoryRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for DirectoryRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SchemaError> for DirectoryRepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<rusqlite::Error> for DirectoryRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for directory records.
pub trait DirectoryRepository {
    fn create_building(&self, draft: &BuildingDraft) -> DirectoryRepoResult<Building>;
    fn get_building(&self, building_id: BuildingId) -> DirectoryRepoResult<Option<Building>>;
    /// Lists all buildings ordered by address.
    fn list_buildings(&self) -> DirectoryRepoResult<Vec<Building>>;
    fn create_organization(&self, draft: &OrganizationDraft)
        -> DirectoryRepoResult<OrganizationId>;
    fn get_organization(
        &self,
        organization_id: OrganizationId,
    ) -> DirectoryRepoResult<Option<OrganizationView>>;
    /// Deletes one organization with its phones and activity links.
    fn delete_organization(&self, organization_id: OrganizationId) -> DirectoryRepoResult<()>;
    /// Case-insensitive substring match on organization name.
    fn search_by_name(&self, needle: &str) -> DirectoryRepoResult<Vec<OrganizationView>>;
    fn list_in_building(&self, building_id: BuildingId)
        -> DirectoryRepoResult<Vec<OrganizationView>>;
    /// Organizations linked to at least one activity in `scope`.
    fn list_in_activity_scope(
        &self,
        scope: &HashSet<ActivityId>,
    ) -> DirectoryRepoResult<Vec<OrganizationView>>;
    fn list_in_bbox(&self, bbox: &BoundingBox) -> DirectoryRepoResult<Vec<OrganizationView>>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> DirectoryRepoResult<Self> {
        ensure_schema_ready(
            conn,
            &[
                ("buildings", BUILDING_COLUMNS),
                ("organizations", ORGANIZATION_COLUMNS),
                ("organization_activities", ORGANIZATION_ACTIVITY_COLUMNS),
                ("phones", PHONE_COLUMNS),
            ],
        )?;
        Ok(Self { conn })
    }

    fn load_views_where(
        &self,
        filter_sql: &str,
        bind_values: Vec<Value>,
    ) -> DirectoryRepoResult<Vec<OrganizationView>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT o.id
             FROM organizations o
             INNER JOIN buildings b ON b.id = o.building_id
             WHERE {filter_sql}
             ORDER BY o.name ASC, o.id ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "organizations.id").map_err(DirectoryRepoError::InvalidData)?);
        }
        drop(rows);

        let mut views = Vec::with_capacity(ids.len());
        for id in ids {
            views.push(load_required_view(self.conn, id)?);
        }
        Ok(views)
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn create_building(&self, draft: &BuildingDraft) -> DirectoryRepoResult<Building> {
        let building = Building {
            id: Uuid::new_v4(),
            address: draft.address.clone(),
            latitude: draft.latitude,
            longitude: draft.longitude,
        };
        self.conn.execute(
            "INSERT INTO buildings (id, address, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                building.id.to_string(),
                building.address,
                building.latitude,
                building.longitude,
            ],
        )?;
        Ok(building)
    }

    fn get_building(&self, building_id: BuildingId) -> DirectoryRepoResult<Option<Building>> {
        load_building(self.conn, building_id)
    }

    fn list_buildings(&self) -> DirectoryRepoResult<Vec<Building>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, address, latitude, longitude
             FROM buildings
             ORDER BY address ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_building_row(row)?);
        }
        Ok(items)
    }

    fn create_organization(
        &self,
        draft: &OrganizationDraft,
    ) -> DirectoryRepoResult<OrganizationId> {
        let tx = WriteScope::begin(self.conn)?;

        if load_building(&tx, draft.building_id)?.is_none() {
            return Err(DirectoryRepoError::BuildingNotFound(draft.building_id));
        }

        let organization_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO organizations (id, name, building_id) VALUES (?1, ?2, ?3);",
            params![
                organization_id.to_string(),
                draft.name,
                draft.building_id.to_string(),
            ],
        )?;

        for activity_id in &draft.activity_ids {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM activities WHERE id = ?1);",
                [activity_id.to_string()],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(DirectoryRepoError::ActivityNotFound(*activity_id));
            }
            tx.execute(
                "INSERT OR IGNORE INTO organization_activities (organization_id, activity_id)
                 VALUES (?1, ?2);",
                params![organization_id.to_string(), activity_id.to_string()],
            )?;
        }

        for number in &draft.phones {
            tx.execute(
                "INSERT INTO phones (id, organization_id, number) VALUES (?1, ?2, ?3);",
                params![
                    Uuid::new_v4().to_string(),
                    organization_id.to_string(),
                    number
                ],
            )?;
        }

        tx.commit()?;
        Ok(organization_id)
    }

    fn get_organization(
        &self,
        organization_id: OrganizationId,
    ) -> DirectoryRepoResult<Option<OrganizationView>> {
        load_view(self.conn, organization_id)
    }

    fn delete_organization(&self, organization_id: OrganizationId) -> DirectoryRepoResult<()> {
        let tx = WriteScope::begin(self.conn)?;
        tx.execute(
            "DELETE FROM phones WHERE organization_id = ?1;",
            [organization_id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM organization_activities WHERE organization_id = ?1;",
            [organization_id.to_string()],
        )?;
        let changed = tx.execute(
            "DELETE FROM organizations WHERE id = ?1;",
            [organization_id.to_string()],
        )?;
        if changed == 0 {
            return Err(DirectoryRepoError::OrganizationNotFound(organization_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn search_by_name(&self, needle: &str) -> DirectoryRepoResult<Vec<OrganizationView>> {
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        self.load_views_where(
            "unicode_lower(o.name) LIKE ?1 ESCAPE '\\'",
            vec![Value::Text(pattern)],
        )
    }

    fn list_in_building(
        &self,
        building_id: BuildingId,
    ) -> DirectoryRepoResult<Vec<OrganizationView>> {
        self.load_views_where(
            "o.building_id = ?1",
            vec![Value::Text(building_id.to_string())],
        )
    }

    fn list_in_activity_scope(
        &self,
        scope: &HashSet<ActivityId>,
    ) -> DirectoryRepoResult<Vec<OrganizationView>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }

        let scope_ids: Vec<ActivityId> = scope.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut views = Vec::new();
        for chunk in scope_ids.chunks(SCOPE_LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let bind_values = chunk
                .iter()
                .map(|id| Value::Text(id.to_string()))
                .collect();
            let found = self.load_views_where(
                &format!(
                    "EXISTS (
                        SELECT 1
                        FROM organization_activities oa
                        WHERE oa.organization_id = o.id
                          AND oa.activity_id IN ({placeholders})
                    )"
                ),
                bind_values,
            )?;
            views.extend(found.into_iter().filter(|view| seen.insert(view.id)));
        }

        if scope_ids.len() > SCOPE_LOOKUP_CHUNK {
            views.sort_by(|left, right| (&left.name, left.id).cmp(&(&right.name, right.id)));
        }
        Ok(views)
    }

    fn list_in_bbox(&self, bbox: &BoundingBox) -> DirectoryRepoResult<Vec<OrganizationView>> {
        self.load_views_where(
            "b.latitude BETWEEN ?1 AND ?2 AND b.longitude BETWEEN ?3 AND ?4",
            vec![
                Value::Real(bbox.min_lat),
                Value::Real(bbox.max_lat),
                Value::Real(bbox.min_lon),
                Value::Real(bbox.max_lon),
            ],
        )
    }
}

fn load_building(
    conn: &Connection,
    building_id: BuildingId,
) -> DirectoryRepoResult<Option<Building>> {
    let mut stmt = conn.prepare(
        "SELECT id, address, latitude, longitude
         FROM buildings
         WHERE id = ?1;",
    )?;
    let mut rows = stmt.query([building_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_building_row(row)?));
    }
    Ok(None)
}

fn load_required_view(
    conn: &Connection,
    organization_id: OrganizationId,
) -> DirectoryRepoResult<OrganizationView> {
    load_view(conn, organization_id)?
        .ok_or(DirectoryRepoError::OrganizationNotFound(organization_id))
}

fn load_view(
    conn: &Connection,
    organization_id: OrganizationId,
) -> DirectoryRepoResult<Option<OrganizationView>> {
    let mut stmt = conn.prepare(
        "SELECT o.id, o.name, o.building_id
         FROM organizations o
         WHERE o.id = ?1;",
    )?;
    let mut rows = stmt.query([organization_id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let name: String = row.get("name")?;
    let building_text: String = row.get("building_id")?;
    let building_id = parse_uuid(&building_text, "organizations.building_id")
        .map_err(DirectoryRepoError::InvalidData)?;
    let building = load_building(conn, building_id)?.ok_or_else(|| {
        DirectoryRepoError::InvalidData(format!(
            "organization {organization_id} references missing building {building_id}"
        ))
    })?;

    Ok(Some(OrganizationView {
        id: organization_id,
        name,
        building,
        activities: load_activity_refs(conn, organization_id)?,
        phones: load_phones(conn, organization_id)?,
    }))
}

fn load_activity_refs(
    conn: &Connection,
    organization_id: OrganizationId,
) -> DirectoryRepoResult<Vec<ActivityRef>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name, a.parent_id
         FROM organization_activities oa
         INNER JOIN activities a ON a.id = oa.activity_id
         WHERE oa.organization_id = ?1
         ORDER BY a.name ASC, a.id ASC;",
    )?;
    let mut rows = stmt.query([organization_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        let parent_id = row
            .get::<_, Option<String>>(2)?
            .map(|value| parse_uuid(&value, "activities.parent_id"))
            .transpose()
            .map_err(DirectoryRepoError::InvalidData)?;
        items.push(ActivityRef {
            id: parse_uuid(&id_text, "activities.id").map_err(DirectoryRepoError::InvalidData)?,
            name: row.get(1)?,
            parent_id,
        });
    }
    Ok(items)
}

fn load_phones(
    conn: &Connection,
    organization_id: OrganizationId,
) -> DirectoryRepoResult<Vec<Phone>> {
    let mut stmt = conn.prepare(
        "SELECT id, number
         FROM phones
         WHERE organization_id = ?1
         ORDER BY number ASC, id ASC;",
    )?;
    let mut rows = stmt.query([organization_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        items.push(Phone {
            id: parse_uuid(&id_text, "phones.id").map_err(DirectoryRepoError::InvalidData)?,
            organization_id,
            number: row.get(1)?,
        });
    }
    Ok(items)
}

fn parse_building_row(row: &Row<'_>) -> DirectoryRepoResult<Building> {
    let id_text: String = row.get("id")?;
    Ok(Building {
        id: parse_uuid(&id_text, "buildings.id").map_err(DirectoryRepoError::InvalidData)?,
        address: row.get("address")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
    })
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
