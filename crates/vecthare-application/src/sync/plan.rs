//! Sync planning
//!
//! Hash-diff between what a backend holds and what the source text
//! currently produces.

use std::collections::HashSet;

use vecthare_domain::value_objects::Chunk;

/// Inserts and deletes needed to make stored state match desired state
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Chunks present in the source but not in the backend
    pub to_insert: Vec<Chunk>,
    /// Hashes present in the backend but no longer in the source
    pub to_delete: Vec<u32>,
}

impl SyncPlan {
    /// True when stored and desired state already agree
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }
}

/// Diff stored hashes against desired chunks.
///
/// `to_delete = saved \ desired`, `to_insert = desired \ saved`. Chunks that
/// already exist are never re-embedded; duplicate desired hashes collapse to
/// the first occurrence.
pub fn plan_sync(saved: &[u32], desired: Vec<Chunk>) -> SyncPlan {
    let saved_set: HashSet<u32> = saved.iter().copied().collect();
    let mut desired_set: HashSet<u32> = HashSet::with_capacity(desired.len());

    let mut to_insert = Vec::new();
    for chunk in desired {
        if !desired_set.insert(chunk.hash) {
            continue;
        }
        if !saved_set.contains(&chunk.hash) {
            to_insert.push(chunk);
        }
    }

    let to_delete = saved
        .iter()
        .copied()
        .filter(|h| !desired_set.contains(h))
        .collect();

    SyncPlan {
        to_insert,
        to_delete,
    }
}
