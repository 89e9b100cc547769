//! Activity hierarchy use-case service.
//!
//! # Responsibility
//! - Normalize inputs and delegate hierarchy mutations to the repository,
//!   which validates depth and acyclicity inside the write transaction.
//! - Translate repository failures into a caller-facing taxonomy with stable
//!   error codes for the API layer.
//! - Provide tree reads and descendant scope resolution.
//!
//! # Invariants
//! - Every rejection leaves the tree unchanged.
//! - `DepthExceeded`, `NotFound` and `CycleDetected` are never retried.

use crate::model::activity::{ActivityId, ActivityNode, ActivityTree, MAX_ACTIVITY_DEPTH};
use crate::repo::activity_repo::{ActivityRepoError, ActivityRepository};
use crate::service::scope_resolver;
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse classification used to pick an API response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityErrorKind {
    DepthExceeded,
    NotFound,
    CycleDetected,
    InvalidInput,
    Storage,
}

/// Errors from activity service operations.
#[derive(Debug)]
pub enum ActivityServiceError {
    /// Display name is blank after trim.
    InvalidName,
    /// Target node does not exist.
    NodeNotFound(ActivityId),
    /// Parent node does not exist.
    ParentNotFound(ActivityId),
    /// Operation would place a node deeper than `MAX_ACTIVITY_DEPTH`.
    DepthExceeded {
        parent_id: ActivityId,
        attempted_depth: u32,
    },
    /// Reassignment would make a node its own ancestor.
    CycleDetected {
        node_id: ActivityId,
        parent_id: ActivityId,
    },
    /// Repository-level failure.
    Repo(ActivityRepoError),
}

impl ActivityServiceError {
    pub fn kind(&self) -> ActivityErrorKind {
        match self {
            Self::InvalidName => ActivityErrorKind::InvalidInput,
            Self::NodeNotFound(_) | Self::ParentNotFound(_) => ActivityErrorKind::NotFound,
            Self::DepthExceeded { .. } => ActivityErrorKind::DepthExceeded,
            Self::CycleDetected { .. } => ActivityErrorKind::CycleDetected,
            Self::Repo(_) => ActivityErrorKind::Storage,
        }
    }

    /// Stable snake_case reason code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidName => "invalid_name",
            Self::NodeNotFound(_) => "activity_not_found",
            Self::ParentNotFound(_) => "parent_not_found",
            Self::DepthExceeded { .. } => "depth_exceeded",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::Repo(_) => "storage_error",
        }
    }
}

impl Display for ActivityServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "activity name must not be blank"),
            Self::NodeNotFound(id) => write!(f, "activity not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent activity not found: {id}"),
            Self::DepthExceeded {
                parent_id,
                attempted_depth,
            } => write!(
                f,
                "max activity tree depth ({MAX_ACTIVITY_DEPTH}) exceeded: depth {attempted_depth} under parent {parent_id}"
            ),
            Self::CycleDetected { node_id, parent_id } => write!(
                f,
                "move would create cycle: activity {node_id} under parent {parent_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ActivityServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ActivityRepoError> for ActivityServiceError {
    fn from(value: ActivityRepoError) -> Self {
        match value {
            ActivityRepoError::NodeNotFound(id) => Self::NodeNotFound(id),
            ActivityRepoError::ParentNotFound(id) => Self::ParentNotFound(id),
            ActivityRepoError::DepthExceeded {
                parent_id,
                attempted_depth,
            } => Self::DepthExceeded {
                parent_id,
                attempted_depth,
            },
            ActivityRepoError::CycleDetected { node_id, parent_id } => {
                Self::CycleDetected { node_id, parent_id }
            }
            other => Self::Repo(other),
        }
    }
}

/// Activity hierarchy service facade.
pub struct ActivityService<R: ActivityRepository> {
    repo: R,
}

impl<R: ActivityRepository> ActivityService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one activity under optional parent.
    pub fn create_node(
        &self,
        name: impl Into<String>,
        parent_id: Option<ActivityId>,
    ) -> Result<ActivityNode, ActivityServiceError> {
        let normalized = normalize_name(name.into())?;
        let result = self
            .repo
            .create_node(normalized.as_str(), parent_id)
            .map_err(ActivityServiceError::from);
        match &result {
            Ok(node) => info!(
                "event=activity_create module=hierarchy status=ok node_id={} parent_id={}",
                node.id,
                display_parent(parent_id)
            ),
            Err(err) => log_rejection("activity_create", err),
        }
        result
    }

    /// Moves one activity, with its subtree, under another parent or to root.
    pub fn reassign_parent(
        &self,
        node_id: ActivityId,
        new_parent_id: Option<ActivityId>,
    ) -> Result<(), ActivityServiceError> {
        let result = self
            .repo
            .reassign_parent(node_id, new_parent_id)
            .map_err(ActivityServiceError::from);
        match &result {
            Ok(()) => info!(
                "event=activity_reassign module=hierarchy status=ok node_id={node_id} parent_id={}",
                display_parent(new_parent_id)
            ),
            Err(err) => log_rejection("activity_reassign", err),
        }
        result
    }

    /// Deletes one activity and all its descendants.
    ///
    /// Returns the number of removed activities.
    pub fn delete_node(&self, node_id: ActivityId) -> Result<usize, ActivityServiceError> {
        let result = self
            .repo
            .delete_node(node_id)
            .map_err(ActivityServiceError::from);
        match &result {
            Ok(removed) => info!(
                "event=activity_delete module=hierarchy status=ok node_id={node_id} removed={removed}"
            ),
            Err(err) => log_rejection("activity_delete", err),
        }
        result
    }

    /// Renames one activity.
    pub fn rename_node(
        &self,
        node_id: ActivityId,
        name: impl Into<String>,
    ) -> Result<(), ActivityServiceError> {
        let normalized = normalize_name(name.into())?;
        self.repo
            .rename_node(node_id, normalized.as_str())
            .map_err(Into::into)
    }

    pub fn get_node(&self, node_id: ActivityId) -> Result<ActivityNode, ActivityServiceError> {
        self.repo
            .get_node(node_id)?
            .ok_or(ActivityServiceError::NodeNotFound(node_id))
    }

    /// Lists children of one parent, or roots when `parent_id` is `None`.
    pub fn list_children(
        &self,
        parent_id: Option<ActivityId>,
    ) -> Result<Vec<ActivityNode>, ActivityServiceError> {
        if let Some(parent_id) = parent_id {
            self.repo
                .get_node(parent_id)?
                .ok_or(ActivityServiceError::ParentNotFound(parent_id))?;
        }
        self.repo.list_children(parent_id).map_err(Into::into)
    }

    /// Returns node depth (root = 1).
    pub fn depth_of(&self, node_id: ActivityId) -> Result<u32, ActivityServiceError> {
        self.repo
            .depth_of(node_id)?
            .ok_or(ActivityServiceError::NodeNotFound(node_id))
    }

    /// Loads one activity with its nested descendants.
    pub fn subtree(&self, node_id: ActivityId) -> Result<ActivityTree, ActivityServiceError> {
        let node = self.get_node(node_id)?;
        self.build_tree(node, MAX_ACTIVITY_DEPTH)
    }

    /// Loads every root with its nested descendants.
    pub fn forest(&self) -> Result<Vec<ActivityTree>, ActivityServiceError> {
        self.repo
            .list_children(None)?
            .into_iter()
            .map(|root| self.build_tree(root, MAX_ACTIVITY_DEPTH))
            .collect()
    }

    /// Returns the activity plus descendants used to scope association
    /// queries. Missing ids give an empty set.
    pub fn resolve_scope(
        &self,
        start_id: ActivityId,
    ) -> Result<HashSet<ActivityId>, ActivityServiceError> {
        scope_resolver::resolve_scope(&self.repo, start_id).map_err(Into::into)
    }

    /// `levels` bounds recursion to the depth invariant.
    fn build_tree(
        &self,
        node: ActivityNode,
        levels: u32,
    ) -> Result<ActivityTree, ActivityServiceError> {
        let children = if levels > 1 {
            self.repo
                .list_children(Some(node.id))?
                .into_iter()
                .map(|child| self.build_tree(child, levels - 1))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        Ok(ActivityTree {
            id: node.id,
            name: node.name,
            parent_id: node.parent_id,
            children,
        })
    }
}

fn normalize_name(value: String) -> Result<String, ActivityServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ActivityServiceError::InvalidName);
    }
    Ok(trimmed.to_string())
}

fn display_parent(parent_id: Option<ActivityId>) -> String {
    parent_id.map_or_else(|| "none".to_string(), |id| id.to_string())
}

fn log_rejection(event: &str, err: &ActivityServiceError) {
    match err.kind() {
        ActivityErrorKind::Storage => error!(
            "event={event} module=hierarchy status=error error_code={} error={err}",
            err.error_code()
        ),
        _ => warn!(
            "event={event} module=hierarchy status=rejected error_code={}",
            err.error_code()
        ),
    }
}
