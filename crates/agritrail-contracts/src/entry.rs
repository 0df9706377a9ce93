//! Audit entry types.
//!
//! `AuditEntry` is one record in a per-entity hash chain.  Each entry commits
//! to the previous entry via `prev_hash`, so retroactively editing or
//! deleting any entry breaks the hashes of every entry after it — this is
//! the tamper-evidence property the whole system rests on.
//!
//! Entries are created once and never mutated, with a single exception:
//! `anchor_snapshot_id` transitions from `None` to `Some` exactly once when
//! the anchor scheduler includes the entry in a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::ActorRef;

/// A detached Ed25519 signature attached to an entry for non-repudiation.
///
/// The signature covers the entry's canonical payload bytes, not the chain
/// hashes — the chain guarantees order and non-tampering, the signature
/// guarantees attribution.  The two are layered, not substitutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySignature {
    /// The key registry id of the signing keypair.
    pub key_id: Uuid,

    /// Hex-encoded 64-byte Ed25519 signature.
    pub signature: String,
}

/// One append-only record of a state-changing action on a domain entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry id; also the leaf identity inside anchor snapshots.
    pub id: Uuid,

    /// Domain type of the mutated entity (e.g. "Animal", "Field").
    pub entity_type: String,

    /// Identifier of the mutated entity within its type.
    pub entity_id: String,

    /// Domain event name (e.g. "vaccination_recorded").  The core does not
    /// interpret this — it only guarantees its integrity.
    pub event_type: String,

    /// Who performed the action.
    pub actor: ActorRef,

    /// Position within this entity's stream, starting at 0.
    pub sequence: u64,

    /// Wall-clock time (UTC) the entry was appended.
    pub recorded_at: DateTime<Utc>,

    /// Event payload as handed in by the domain layer.  Hashing always goes
    /// through canonical serialization, so key order here is irrelevant.
    pub payload: serde_json::Value,

    /// SHA-256 hash (hex) of the previous entry in this stream, or
    /// `GENESIS_HASH` for the first entry.
    pub prev_hash: String,

    /// SHA-256 hash (hex) over this entry's identity fields, canonical
    /// payload, and `prev_hash`.  Computed by `agritrail-chain::hash_entry`.
    pub current_hash: String,

    /// Present when the event required a non-repudiable approval.
    pub signature: Option<EntrySignature>,

    /// Set once when the entry is covered by an anchor snapshot.
    /// An entry is anchored in at most one snapshot.
    pub anchor_snapshot_id: Option<Uuid>,
}

impl AuditEntry {
    /// The sentinel `prev_hash` for the first entry in every stream.
    ///
    /// 64 hex zeros — a value that can never be the SHA-256 of real data,
    /// making genesis detection unambiguous.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// True until the entry has been covered by an anchor snapshot.
    pub fn is_anchored(&self) -> bool {
        self.anchor_snapshot_id.is_some()
    }
}
