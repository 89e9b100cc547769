//! Directory use-case service.
//!
//! # Responsibility
//! - Validate directory drafts and query inputs before repository calls.
//! - Scope activity lookups through the descendant resolver.
//!
//! # Invariants
//! - Activity lookups for a missing activity return an empty list.
//! - Query results are ordered by organization name, then id.

use crate::model::activity::ActivityId;
use crate::model::directory::{
    BoundingBox, Building, BuildingDraft, BuildingId, DirectoryValidationError,
    OrganizationDraft, OrganizationId, OrganizationView,
};
use crate::repo::activity_repo::{ActivityReadView, ActivityRepoError};
use crate::repo::directory_repo::{DirectoryRepoError, DirectoryRepository};
use crate::service::scope_resolver::resolve_scope;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from directory service operations.
#[derive(Debug)]
pub enum DirectoryServiceError {
    Validation(DirectoryValidationError),
    BuildingNotFound(BuildingId),
    OrganizationNotFound(OrganizationId),
    ActivityNotFound(ActivityId),
    Repo(DirectoryRepoError),
    /// Failure while resolving an activity scope.
    Activity(ActivityRepoError),
}

impl DirectoryServiceError {
    /// Stable snake_case reason code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_input",
            Self::BuildingNotFound(_) => "building_not_found",
            Self::OrganizationNotFound(_) => "organization_not_found",
            Self::ActivityNotFound(_) => "activity_not_found",
            Self::Repo(_) | Self::Activity(_) => "storage_error",
        }
    }
}

impl Display for DirectoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::BuildingNotFound(id) => write!(f, "building not found: {id}"),
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::ActivityNotFound(id) => write!(f, "activity not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Activity(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DirectoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Activity(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DirectoryValidationError> for DirectoryServiceError {
    fn from(value: DirectoryValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DirectoryRepoError> for DirectoryServiceError {
    fn from(value: DirectoryRepoError) -> Self {
        match value {
            DirectoryRepoError::BuildingNotFound(id) => Self::BuildingNotFound(id),
            DirectoryRepoError::OrganizationNotFound(id) => Self::OrganizationNotFound(id),
            DirectoryRepoError::ActivityNotFound(id) => Self::ActivityNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ActivityRepoError> for DirectoryServiceError {
    fn from(value: ActivityRepoError) -> Self {
        Self::Activity(value)
    }
}

pub type DirectoryServiceResult<T> = Result<T, DirectoryServiceError>;

/// Directory service facade over directory records and the activity read view.
pub struct DirectoryService<D: DirectoryRepository, A: ActivityReadView> {
    directory: D,
    activities: A,
}

impl<D: DirectoryRepository, A: ActivityReadView> DirectoryService<D, A> {
    pub fn new(directory: D, activities: A) -> Self {
        Self {
            directory,
            activities,
        }
    }

    pub fn create_building(&self, draft: &BuildingDraft) -> DirectoryServiceResult<Building> {
        let normalized = draft.validate()?;
        Ok(self.directory.create_building(&normalized)?)
    }

    pub fn get_building(&self, building_id: BuildingId) -> DirectoryServiceResult<Building> {
        self.directory
            .get_building(building_id)?
            .ok_or(DirectoryServiceError::BuildingNotFound(building_id))
    }

    pub fn list_buildings(&self) -> DirectoryServiceResult<Vec<Building>> {
        Ok(self.directory.list_buildings()?)
    }

    /// Creates one organization with links and phones, returning its view.
    pub fn create_organization(
        &self,
        draft: &OrganizationDraft,
    ) -> DirectoryServiceResult<OrganizationView> {
        let normalized = draft.validate()?;
        let organization_id = self.directory.create_organization(&normalized)?;
        self.get_organization(organization_id)
    }

    pub fn get_organization(
        &self,
        organization_id: OrganizationId,
    ) -> DirectoryServiceResult<OrganizationView> {
        self.directory
            .get_organization(organization_id)?
            .ok_or(DirectoryServiceError::OrganizationNotFound(organization_id))
    }

    pub fn delete_organization(
        &self,
        organization_id: OrganizationId,
    ) -> DirectoryServiceResult<()> {
        Ok(self.directory.delete_organization(organization_id)?)
    }

    /// Case-insensitive partial match on organization name.
    pub fn search_organizations_by_name(
        &self,
        query: &str,
    ) -> DirectoryServiceResult<Vec<OrganizationView>> {
        let needle = query.trim();
        if needle.is_empty() {
            return Err(DirectoryValidationError::BlankSearchQuery.into());
        }
        Ok(self.directory.search_by_name(needle)?)
    }

    pub fn organizations_in_building(
        &self,
        building_id: BuildingId,
    ) -> DirectoryServiceResult<Vec<OrganizationView>> {
        Ok(self.directory.list_in_building(building_id)?)
    }

    /// Organizations linked to the activity or any descendant within the
    /// depth bound.
    pub fn organizations_by_activity(
        &self,
        activity_id: ActivityId,
    ) -> DirectoryServiceResult<Vec<OrganizationView>> {
        let scope = resolve_scope(&self.activities, activity_id)?;
        debug!(
            "event=scope_resolve module=directory status=ok activity_id={activity_id} scope_size={}",
            scope.len()
        );
        Ok(self.directory.list_in_activity_scope(&scope)?)
    }

    /// Organizations whose building lies inside the inclusive rectangle.
    pub fn organizations_in_bbox(
        &self,
        bbox: &BoundingBox,
    ) -> DirectoryServiceResult<Vec<OrganizationView>> {
        bbox.validate()?;
        Ok(self.directory.list_in_bbox(bbox)?)
    }
}
