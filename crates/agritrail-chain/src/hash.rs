//! Hash engine: deterministic content hash for one audit entry.
//!
//! Every field that contributes to an entry's hash is listed explicitly so
//! nothing is accidentally omitted.
//!
//! Hash input layout (bytes, in order):
//!   1. entry id as UTF-8 of its hyphenated form
//!   2. entity_type as UTF-8
//!   3. entity_id as UTF-8
//!   4. event_type as UTF-8
//!   5. actor id as UTF-8
//!   6. actor role as UTF-8
//!   7. sequence as 8-byte little-endian
//!   8. recorded_at as microseconds-since-epoch, 8-byte little-endian
//!   9. prev_hash as UTF-8 (64 ASCII hex chars, or the genesis sentinel)
//!  10. canonical payload JSON as UTF-8
//!
//! Every string field is length-prefixed with its byte count as 8-byte
//! little-endian, so shifting bytes across a field boundary (e.g. between
//! entity_type and entity_id) can never produce the same input.
//!
//! The actor's display name is deliberately excluded: it is presentation
//! data and may be re-rendered without being an audit-relevant change.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use agritrail_contracts::actor::ActorRef;

/// Compute the SHA-256 hash for a single audit entry.
///
/// `payload_canonical` must be the output of [`crate::canonical::canonicalize`]
/// on the entry's payload.  `prev_hash` is the preceding entry's
/// `current_hash`, or `AuditEntry::GENESIS_HASH` for the first entry in a
/// stream.
///
/// Returns a lowercase 64-character hex string.
#[allow(clippy::too_many_arguments)]
pub fn hash_entry(
    id: &Uuid,
    entity_type: &str,
    entity_id: &str,
    event_type: &str,
    actor: &ActorRef,
    sequence: u64,
    recorded_at: &DateTime<Utc>,
    prev_hash: &str,
    payload_canonical: &str,
) -> String {
    let mut hasher = Sha256::new();
    update_framed(&mut hasher, &id.hyphenated().to_string());
    update_framed(&mut hasher, entity_type);
    update_framed(&mut hasher, entity_id);
    update_framed(&mut hasher, event_type);
    update_framed(&mut hasher, &actor.id);
    update_framed(&mut hasher, &actor.role);
    hasher.update(sequence.to_le_bytes());
    hasher.update(recorded_at.timestamp_micros().to_le_bytes());
    update_framed(&mut hasher, prev_hash);
    update_framed(&mut hasher, payload_canonical);

    hex::encode(hasher.finalize())
}

/// Feed one length-prefixed string field into the hasher.
fn update_framed(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use agritrail_contracts::{actor::ActorRef, entry::AuditEntry};

    use crate::canonical::canonicalize;

    use super::hash_entry;

    fn actor() -> ActorRef {
        ActorRef::new("u-100", "farmhand", "Sam Byrne")
    }

    #[test]
    fn hash_is_deterministic() {
        let id = Uuid::new_v4();
        let at = Utc::now();
        let canonical = canonicalize(&json!({ "field": "x", "value": 1 })).unwrap();

        let first = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 0, &at,
            AuditEntry::GENESIS_HASH, &canonical,
        );
        let second = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 0, &at,
            AuditEntry::GENESIS_HASH, &canonical,
        );

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    /// Semantically equal payloads serialized with different key order hash
    /// identically once they pass through canonicalization.
    #[test]
    fn canonicalization_round_trip_property() {
        let id = Uuid::new_v4();
        let at = Utc::now();

        let a: serde_json::Value =
            serde_json::from_str(r#"{"value":1,"field":"x"}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"field":"x","value":1}"#).unwrap();

        let hash_a = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 0, &at,
            AuditEntry::GENESIS_HASH, &canonicalize(&a).unwrap(),
        );
        let hash_b = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 0, &at,
            AuditEntry::GENESIS_HASH, &canonicalize(&b).unwrap(),
        );

        assert_eq!(hash_a, hash_b);
    }

    /// Changing any single hashed field changes the output.
    #[test]
    fn each_field_contributes() {
        let id = Uuid::new_v4();
        let at = Utc::now();
        let canonical = canonicalize(&json!({ "v": 1 })).unwrap();

        let base = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 3, &at,
            AuditEntry::GENESIS_HASH, &canonical,
        );

        let other_entity = hash_entry(
            &id, "Animal", "43", "updated", &actor(), 3, &at,
            AuditEntry::GENESIS_HASH, &canonical,
        );
        assert_ne!(base, other_entity);

        let other_sequence = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 4, &at,
            AuditEntry::GENESIS_HASH, &canonical,
        );
        assert_ne!(base, other_sequence);

        let other_prev = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 3, &at,
            &"11".repeat(32), &canonical,
        );
        assert_ne!(base, other_prev);
    }

    /// Shifting bytes across a field boundary must change the hash: the
    /// concatenated fields "Animal"/"42" and "Anima"/"l42" are distinct
    /// inputs because every string field is length-framed.
    #[test]
    fn field_boundaries_are_framed() {
        let id = Uuid::new_v4();
        let at = Utc::now();
        let canonical = canonicalize(&json!({ "v": 1 })).unwrap();

        let base = hash_entry(
            &id, "Animal", "42", "updated", &actor(), 0, &at,
            AuditEntry::GENESIS_HASH, &canonical,
        );
        let shifted = hash_entry(
            &id, "Anima", "l42", "updated", &actor(), 0, &at,
            AuditEntry::GENESIS_HASH, &canonical,
        );

        assert_ne!(base, shifted);
    }
}
