//! In-memory store for anchor snapshots.
//!
//! Snapshots are write-once: inserted by the anchor scheduler after ledger
//! confirmation, never updated, never deleted.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use agritrail_contracts::{
    error::{TrailError, TrailResult},
    snapshot::AnchorSnapshot,
};

/// Append-only collection of `AnchorSnapshot`s keyed by id.
pub struct SnapshotStore {
    snapshots: RwLock<HashMap<Uuid, AnchorSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Record a freshly confirmed snapshot.
    ///
    /// A duplicate id is an `Integrity` error — it would mean two anchor
    /// cycles committed the same snapshot, which the single-flight guard
    /// is supposed to make impossible.
    pub fn insert(&self, snapshot: AnchorSnapshot) -> TrailResult<()> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("snapshot store lock poisoned: {e}"),
            })?;

        if snapshots.contains_key(&snapshot.id) {
            return Err(TrailError::Integrity {
                reason: format!("snapshot {} already recorded", snapshot.id),
            });
        }
        snapshots.insert(snapshot.id, snapshot);
        Ok(())
    }

    pub fn get(&self, snapshot_id: Uuid) -> TrailResult<AnchorSnapshot> {
        self.snapshots
            .read()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("snapshot store lock poisoned: {e}"),
            })?
            .get(&snapshot_id)
            .cloned()
            .ok_or_else(|| TrailError::NotFound {
                kind: "anchor snapshot",
                id: snapshot_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
