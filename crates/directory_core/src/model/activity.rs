//! Activity category tree model.
//!
//! # Responsibility
//! - Define the flat, id-referencing activity node record.
//! - Publish the fixed depth bound shared by the store and the resolver.
//!
//! # Invariants
//! - A root has depth 1; no node may sit deeper than `MAX_ACTIVITY_DEPTH`.
//! - Parent/child relations are id references, never owned pointers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one activity category.
pub type ActivityId = Uuid;

/// Maximum number of nodes on the path from any activity up to its root.
pub const MAX_ACTIVITY_DEPTH: u32 = 3;

/// Persisted activity node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityNode {
    /// Stable node id.
    pub id: ActivityId,
    /// User-facing category name, trimmed and non-blank.
    pub name: String,
    /// Parent node id. `None` means root-level node.
    pub parent_id: Option<ActivityId>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl ActivityNode {
    /// Returns whether this node is a root category.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Nested read model of one activity and everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTree {
    pub id: ActivityId,
    pub name: String,
    pub parent_id: Option<ActivityId>,
    /// Direct children, ordered by name then id.
    pub children: Vec<ActivityTree>,
}

impl ActivityTree {
    /// Number of levels in this tree, counting the node itself.
    pub fn height(&self) -> u32 {
        1 + self
            .children
            .iter()
            .map(ActivityTree::height)
            .max()
            .unwrap_or(0)
    }

    /// Total number of nodes in this tree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ActivityTree::node_count).sum::<usize>()
    }
}
