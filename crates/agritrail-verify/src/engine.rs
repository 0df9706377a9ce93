//! Verification engine: chain continuity and anchored inclusion proofs.
//!
//! Both checks return their result as data.  A broken chain is evidence to
//! be reported, not a bug to silently fix — verification never repairs, and
//! never throws for "broken".
//!
//! Broken-at convention (pinned): `broken_at_entry_id` names the **first
//! entry whose own stored fields fail**, whether that is a `current_hash`
//! that no longer matches recomputation (the entry itself was edited) or a
//! `prev_hash` that no longer matches its predecessor (the link was
//! severed).  Corrupting entry *i*'s payload or `current_hash` therefore
//! reports *i*.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use agritrail_anchor::{verify_path, MerkleTree, PathStep, SnapshotStore};
use agritrail_chain::{canonicalize, hash_entry, ChainStore};
use agritrail_contracts::{
    entry::AuditEntry,
    error::{TrailError, TrailResult},
};

/// Result of a chain-continuity check over one entity stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub is_valid: bool,

    /// Entries examined, as of this verification's snapshot-in-time read.
    pub total_entries: usize,

    /// The first entry whose stored fields failed, when `is_valid` is false.
    pub broken_at_entry_id: Option<Uuid>,
}

/// Result of an inclusion-proof check for one anchored entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InclusionVerification {
    pub is_valid: bool,

    /// The anchored root the proof was checked against.
    pub merkle_root: String,

    /// Position of the entry within the snapshot's leaf order.
    pub leaf_index: usize,

    /// The reconstructed authentication path, for audit display.
    pub path: Vec<PathStep>,
}

/// Recompute and check every hash and link in `entries` (stream order).
///
/// Stops at the first discrepancy.  An empty stream is trivially valid.
pub fn verify_entries(entries: &[AuditEntry]) -> ChainVerification {
    let mut expected_prev = AuditEntry::GENESIS_HASH.to_string();

    for entry in entries {
        // Link rule: the stored prev_hash must match the predecessor.
        if entry.prev_hash != expected_prev {
            warn!(entry_id = %entry.id, sequence = entry.sequence, "prev-hash link broken");
            return broken_at(entries, entry.id);
        }

        // Hash rule: the stored current_hash must match recomputation from
        // the entry's own stored fields.
        let recomputed = match canonicalize(&entry.payload) {
            Ok(canonical) => hash_entry(
                &entry.id,
                &entry.entity_type,
                &entry.entity_id,
                &entry.event_type,
                &entry.actor,
                entry.sequence,
                &entry.recorded_at,
                &entry.prev_hash,
                &canonical,
            ),
            // An uncanonicalizable payload cannot be the one that produced
            // the stored hash.
            Err(_) => {
                warn!(entry_id = %entry.id, "payload no longer canonicalizable");
                return broken_at(entries, entry.id);
            }
        };
        if recomputed != entry.current_hash {
            warn!(entry_id = %entry.id, sequence = entry.sequence, "current-hash mismatch");
            return broken_at(entries, entry.id);
        }

        expected_prev = entry.current_hash.clone();
    }

    ChainVerification {
        is_valid: true,
        total_entries: entries.len(),
        broken_at_entry_id: None,
    }
}

fn broken_at(entries: &[AuditEntry], entry_id: Uuid) -> ChainVerification {
    ChainVerification {
        is_valid: false,
        total_entries: entries.len(),
        broken_at_entry_id: Some(entry_id),
    }
}

/// Read-only verification facade over the chain and snapshot stores.
pub struct VerificationEngine {
    store: Arc<ChainStore>,
    snapshots: Arc<SnapshotStore>,
}

impl VerificationEngine {
    pub fn new(store: Arc<ChainStore>, snapshots: Arc<SnapshotStore>) -> Self {
        Self { store, snapshots }
    }

    pub(crate) fn store(&self) -> &ChainStore {
        &self.store
    }

    pub(crate) fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Chain-continuity check for one entity stream.
    ///
    /// Reads a snapshot-in-time copy of the stream; a concurrent append may
    /// not be visible, which is fine — `total_entries` reflects the read.
    pub fn verify_chain(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> TrailResult<ChainVerification> {
        let entries = self.store.stream_for(entity_type, entity_id)?;
        let verification = verify_entries(&entries);
        debug!(
            stream = format!("{entity_type}/{entity_id}"),
            is_valid = verification.is_valid,
            total_entries = verification.total_entries,
            "chain verified"
        );
        Ok(verification)
    }

    /// Inclusion-proof check for one entry against its anchor snapshot.
    ///
    /// Rebuilds the snapshot's tree from the entries' *currently stored*
    /// hashes and compares the reconstructed root and path against the
    /// snapshot's recorded `merkle_root` — so tampering with any covered
    /// entry after anchoring fails the proof.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown entry, an entry not yet anchored, or a
    /// missing snapshot; `Integrity` when the snapshot does not list the
    /// entry it supposedly covers.
    pub fn verify_inclusion(&self, entry_id: Uuid) -> TrailResult<InclusionVerification> {
        let entry = self.store.entry(entry_id)?;
        let snapshot_id = entry
            .anchor_snapshot_id
            .ok_or_else(|| TrailError::NotFound {
                kind: "anchor snapshot for entry",
                id: entry_id.to_string(),
            })?;
        let snapshot = self.snapshots.get(snapshot_id)?;

        let leaf_index = snapshot
            .entry_ids
            .iter()
            .position(|id| *id == entry_id)
            .ok_or_else(|| TrailError::Integrity {
                reason: format!(
                    "entry {entry_id} references snapshot {snapshot_id}, which does not cover it"
                ),
            })?;

        let mut leaves = Vec::with_capacity(snapshot.entry_ids.len());
        for id in &snapshot.entry_ids {
            leaves.push(self.store.entry(*id)?.current_hash);
        }

        let tree = MerkleTree::from_leaf_hex(&leaves)?;
        let path = tree.path(leaf_index)?;
        let is_valid = tree.root_hex() == snapshot.merkle_root
            && verify_path(&entry.current_hash, &path, &snapshot.merkle_root);

        debug!(
            entry_id = %entry_id,
            snapshot_id = %snapshot_id,
            leaf_index,
            is_valid,
            "inclusion proof checked"
        );
        Ok(InclusionVerification {
            is_valid,
            merkle_root: snapshot.merkle_root,
            leaf_index,
            path,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
