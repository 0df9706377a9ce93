//! Certificate data assembly.
//!
//! Produces the flat structure the external document renderer turns into a
//! verification certificate (PDF or otherwise).  The core never renders
//! documents itself — it only assembles provable facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use agritrail_contracts::error::{TrailError, TrailResult};

use crate::engine::VerificationEngine;

/// Everything a third party needs to independently confirm an entry:
/// the entry's identity, and the external anchoring references of the
/// snapshot that committed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateData {
    // Entry identity.
    pub entry_id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: String,
    pub actor_id: String,
    pub actor_role: String,
    pub recorded_at: DateTime<Utc>,
    pub entry_hash: String,

    // Anchoring references.
    pub snapshot_id: Uuid,
    pub transaction_id: String,
    pub block_reference: String,
    pub explorer_url: Option<String>,
    pub anchored_at: DateTime<Utc>,
    pub snapshot_entry_count: usize,
}

impl VerificationEngine {
    /// Assemble certificate data for an anchored entry.
    ///
    /// Fails with `Integrity` if the entry's inclusion proof does not verify
    /// — a certificate must never be issued over a broken proof.
    pub fn assemble_certificate(&self, entry_id: Uuid) -> TrailResult<CertificateData> {
        let inclusion = self.verify_inclusion(entry_id)?;
        if !inclusion.is_valid {
            return Err(TrailError::Integrity {
                reason: format!("inclusion proof for entry {entry_id} does not verify"),
            });
        }

        let entry = self.store().entry(entry_id)?;
        // verify_inclusion succeeded, so the snapshot id is present.
        let snapshot_id = entry.anchor_snapshot_id.ok_or_else(|| TrailError::NotFound {
            kind: "anchor snapshot for entry",
            id: entry_id.to_string(),
        })?;
        let snapshot = self.snapshots().get(snapshot_id)?;

        debug!(entry_id = %entry_id, snapshot_id = %snapshot_id, "certificate data assembled");
        Ok(CertificateData {
            entry_id: entry.id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            event_type: entry.event_type,
            actor_id: entry.actor.id,
            actor_role: entry.actor.role,
            recorded_at: entry.recorded_at,
            entry_hash: entry.current_hash,
            snapshot_id,
            transaction_id: snapshot.transaction_id,
            block_reference: snapshot.block_reference,
            explorer_url: snapshot.explorer_url,
            anchored_at: snapshot.created_at,
            snapshot_entry_count: snapshot.entry_ids.len(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
