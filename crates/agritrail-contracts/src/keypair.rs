//! Public key material records.
//!
//! Only the public half of a keypair ever appears in these types.  Private
//! keys live inside the signature service (acting on the actor's behalf)
//! and are never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The public record of an actor-held Ed25519 keypair.
///
/// Created on actor onboarding, never mutated except for supersession:
/// generating a new key for the same actor stamps `superseded_at` on the
/// old record.  Records are never hard-deleted while referenced by any
/// entry signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairRecord {
    /// Registry id referenced by `EntrySignature::key_id`.
    pub key_id: Uuid,

    /// The actor this keypair belongs to.
    pub actor_id: String,

    /// Hex-encoded 32-byte Ed25519 verifying key.
    pub public_key: String,

    /// Wall-clock time (UTC) the keypair was generated.
    pub created_at: DateTime<Utc>,

    /// Set when a newer keypair for the same actor replaced this one.
    pub superseded_at: Option<DateTime<Utc>>,
}

impl KeyPairRecord {
    /// True while this is the actor's current signing key.
    pub fn is_active(&self) -> bool {
        self.superseded_at.is_none()
    }
}
