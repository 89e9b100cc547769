//! Descendant scope resolution for activity-scoped queries.
//!
//! # Responsibility
//! - Compute the set of activity ids "under" a starting activity (itself
//!   plus descendants) for association lookups.
//!
//! # Invariants
//! - Expansion runs at most `SCOPE_EXPANSION_LEVELS` rounds, a fixed count
//!   derived from the depth bound, even if stored data ever violated it.
//! - A missing start id yields an empty set, not an error.
//! - No side effects; the set is recomputed on every call.

use crate::model::activity::{ActivityId, MAX_ACTIVITY_DEPTH};
use crate::repo::activity_repo::{ActivityReadView, ActivityRepoResult};
use std::collections::HashSet;

/// Child generations explored below the start node.
pub const SCOPE_EXPANSION_LEVELS: u32 = MAX_ACTIVITY_DEPTH - 1;

/// Returns `start_id` plus its descendants within the depth bound.
pub fn resolve_scope<V>(view: &V, start_id: ActivityId) -> ActivityRepoResult<HashSet<ActivityId>>
where
    V: ActivityReadView + ?Sized,
{
    if view.get_node(start_id)?.is_none() {
        return Ok(HashSet::new());
    }

    let mut scope = HashSet::from([start_id]);
    let mut frontier = vec![start_id];
    for _ in 0..SCOPE_EXPANSION_LEVELS {
        if frontier.is_empty() {
            break;
        }
        frontier = view
            .child_ids(&frontier)?
            .into_iter()
            .filter(|id| scope.insert(*id))
            .collect();
    }
    Ok(scope)
}
