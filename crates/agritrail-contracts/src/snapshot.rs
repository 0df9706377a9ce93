//! Anchor snapshot: a point-in-time commitment of a batch of entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A Merkle commitment over a batch of audit entries, anchored externally.
///
/// Created by the anchor scheduler after the external ledger confirms the
/// root submission; immutable thereafter and never deleted.  Every entry in
/// `entry_ids` was unanchored at selection time and became anchored
/// atomically with this snapshot's creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorSnapshot {
    pub id: Uuid,

    /// Wall-clock time (UTC) the snapshot was recorded, i.e. when the
    /// ledger confirmed the submission.
    pub created_at: DateTime<Utc>,

    /// Covered entry ids in leaf order.  The index of an id in this list is
    /// its leaf index in the Merkle tree.
    pub entry_ids: Vec<Uuid>,

    /// Root of the Merkle tree built over the covered entries'
    /// `current_hash` values, hex-encoded.
    pub merkle_root: String,

    /// Transaction id returned by the external ledger.
    pub transaction_id: String,

    /// Block reference returned by the external ledger.
    pub block_reference: String,

    /// Public explorer link for the anchoring transaction, when the ledger
    /// client can build one.
    pub explorer_url: Option<String>,
}

impl AnchorSnapshot {
    /// Number of entries committed by this snapshot.
    pub fn entry_count(&self) -> usize {
        self.entry_ids.len()
    }
}
