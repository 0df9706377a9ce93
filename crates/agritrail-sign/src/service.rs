//! Ed25519 signing, verification, and the actor key registry.
//!
//! Signatures provide *attribution* on top of the hash chain's *order and
//! non-tampering* guarantee: a signed entry cannot be credibly disowned by
//! the actor whose key produced the signature.
//!
//! Private keys never leave this service.  The registry keeps only one
//! active key per actor; generating a replacement supersedes (never
//! deletes) the previous record, since old signatures must stay verifiable.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use agritrail_contracts::{
    entry::EntrySignature,
    error::{TrailError, TrailResult},
    keypair::KeyPairRecord,
};

struct StoredKey {
    record: KeyPairRecord,
    signing_key: SigningKey,
}

/// Key registry and signing facade for actor-attributable approvals.
///
/// # Thread safety
///
/// Safe behind an `Arc`; the registry maps are `RwLock`-protected, so
/// concurrent signing by different actors does not serialize.
pub struct SignatureService {
    keys: RwLock<HashMap<Uuid, StoredKey>>,
    active_by_actor: RwLock<HashMap<String, Uuid>>,
}

impl SignatureService {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            active_by_actor: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a fresh Ed25519 keypair for `actor_id`.
    ///
    /// Any previous active key for the actor is stamped `superseded_at` but
    /// kept in the registry so existing signatures remain verifiable.
    /// Returns the public record only — the private half stays inside the
    /// service.
    pub fn generate_keypair(&self, actor_id: &str) -> TrailResult<KeyPairRecord> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let record = KeyPairRecord {
            key_id: Uuid::new_v4(),
            actor_id: actor_id.to_string(),
            public_key: hex::encode(signing_key.verifying_key().to_bytes()),
            created_at: Utc::now(),
            superseded_at: None,
        };

        let mut keys = self.write_keys()?;
        let mut active = self
            .active_by_actor
            .write()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("active key map lock poisoned: {e}"),
            })?;

        if let Some(previous_id) = active.get(actor_id) {
            if let Some(previous) = keys.get_mut(previous_id) {
                previous.record.superseded_at = Some(Utc::now());
            }
        }

        keys.insert(
            record.key_id,
            StoredKey {
                record: record.clone(),
                signing_key,
            },
        );
        active.insert(actor_id.to_string(), record.key_id);

        info!(
            actor_id,
            key_id = %record.key_id,
            "keypair generated"
        );
        Ok(record)
    }

    /// Sign `message` (the entry's canonical payload bytes) with the
    /// actor's active key.
    pub fn sign(&self, actor_id: &str, message: &[u8]) -> TrailResult<EntrySignature> {
        let key_id = self
            .active_by_actor
            .read()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("active key map lock poisoned: {e}"),
            })?
            .get(actor_id)
            .copied()
            .ok_or_else(|| TrailError::NotFound {
                kind: "active signing key for actor",
                id: actor_id.to_string(),
            })?;

        let keys = self.read_keys()?;
        let stored = keys.get(&key_id).ok_or_else(|| TrailError::NotFound {
            kind: "signing key",
            id: key_id.to_string(),
        })?;

        let signature = stored.signing_key.sign(message);
        Ok(EntrySignature {
            key_id,
            signature: hex::encode(signature.to_bytes()),
        })
    }

    /// Verify `signature_hex` over `message` against `public_key_hex`.
    ///
    /// A well-formed but wrong signature returns `Ok(false)`; malformed key
    /// or signature bytes return `KeyMaterial`.
    pub fn verify(
        &self,
        message: &[u8],
        signature_hex: &str,
        public_key_hex: &str,
    ) -> TrailResult<bool> {
        let key_bytes: [u8; 32] = hex::decode(public_key_hex)
            .map_err(|e| TrailError::KeyMaterial {
                reason: format!("public key is not valid hex: {e}"),
            })?
            .try_into()
            .map_err(|_| TrailError::KeyMaterial {
                reason: "public key must be exactly 32 bytes".to_string(),
            })?;
        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|e| TrailError::KeyMaterial {
                reason: format!("invalid Ed25519 public key: {e}"),
            })?;

        let signature_bytes = hex::decode(signature_hex).map_err(|e| TrailError::KeyMaterial {
            reason: format!("signature is not valid hex: {e}"),
        })?;
        let signature =
            Signature::from_slice(&signature_bytes).map_err(|e| TrailError::KeyMaterial {
                reason: format!("invalid Ed25519 signature encoding: {e}"),
            })?;

        Ok(verifying_key.verify(message, &signature).is_ok())
    }

    /// Public record for a key by registry id.
    pub fn key_record(&self, key_id: Uuid) -> TrailResult<KeyPairRecord> {
        self.read_keys()?
            .get(&key_id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| TrailError::NotFound {
                kind: "signing key",
                id: key_id.to_string(),
            })
    }

    /// The actor's current active key record.
    pub fn active_key(&self, actor_id: &str) -> TrailResult<KeyPairRecord> {
        let key_id = self
            .active_by_actor
            .read()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("active key map lock poisoned: {e}"),
            })?
            .get(actor_id)
            .copied()
            .ok_or_else(|| TrailError::NotFound {
                kind: "active signing key for actor",
                id: actor_id.to_string(),
            })?;
        self.key_record(key_id)
    }

    fn read_keys(&self) -> TrailResult<std::sync::RwLockReadGuard<'_, HashMap<Uuid, StoredKey>>> {
        self.keys.read().map_err(|e| TrailError::ConcurrencyConflict {
            reason: format!("key registry lock poisoned: {e}"),
        })
    }

    fn write_keys(&self) -> TrailResult<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, StoredKey>>> {
        self.keys.write().map_err(|e| TrailError::ConcurrencyConflict {
            reason: format!("key registry lock poisoned: {e}"),
        })
    }
}

impl Default for SignatureService {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
