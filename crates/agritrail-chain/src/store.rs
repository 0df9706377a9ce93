//! Append-only, per-entity-stream chain store.
//!
//! Each entity stream (one `StreamKey`) owns a `Mutex` around its entries,
//! so appends to the *same* stream are strictly serialized — `prev_hash` is
//! never computed from a stale "latest" read — while appends to *different*
//! streams proceed in parallel.  The stream map itself sits behind an
//! `RwLock` that is only write-locked when a brand-new stream appears.
//!
//! "Latest hash per entity" is data owned by this store, not ambient
//! process-wide state: independent stores (and tests) never interfere.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use agritrail_contracts::{
    actor::ActorRef,
    entry::{AuditEntry, EntrySignature},
    error::{TrailError, TrailResult},
};

use crate::{canonical::canonicalize, hash::hash_entry};

/// How long an append waits for a contended stream lock before giving up
/// with `ConcurrencyConflict`.
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Identifies one entity stream: all entries for one domain record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub entity_type: String,
    pub entity_id: String,
}

impl StreamKey {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

// ── Internal mutable state ────────────────────────────────────────────────────

/// The mutable interior of one entity stream.
pub(crate) struct StreamState {
    /// All entries for this stream, in append order.
    pub(crate) entries: Vec<AuditEntry>,

    /// The next sequence number to assign (starts at 0).
    next_sequence: u64,

    /// The `current_hash` of the last appended entry, or `GENESIS_HASH`
    /// before any entry exists.
    last_hash: String,
}

impl StreamState {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_sequence: 0,
            last_hash: AuditEntry::GENESIS_HASH.to_string(),
        }
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// In-memory, append-only audit store keyed by entity stream.
///
/// # Thread safety
///
/// Safe to share behind an `Arc` across request handlers and the anchor
/// scheduler.  Appends to one stream serialize on that stream's mutex with
/// a bounded wait; reads clone a snapshot of the stream under its lock and
/// scan lock-free afterwards.
pub struct ChainStore {
    streams: RwLock<HashMap<StreamKey, Arc<Mutex<StreamState>>>>,
    index: RwLock<HashMap<Uuid, StreamKey>>,
    lock_wait: Duration,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }

    /// Create a store with a custom bound on stream-lock waits.
    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            lock_wait,
        }
    }

    // ── Append path ───────────────────────────────────────────────────────────

    /// Append one entry to the stream for `(entity_type, entity_id)`.
    ///
    /// Reads the stream's latest hash, computes `prev_hash` from it (or the
    /// genesis sentinel), computes `current_hash` via the hash engine, and
    /// persists — all under the stream's mutex.  Never mutates or removes an
    /// existing entry.
    ///
    /// # Errors
    ///
    /// - `Canonicalization` if the payload cannot be canonicalized
    /// - `ConcurrencyConflict` if the stream lock stays contended beyond the
    ///   bounded wait (the caller may retry)
    pub fn append(
        &self,
        entity_type: &str,
        entity_id: &str,
        event_type: &str,
        payload: serde_json::Value,
        actor: ActorRef,
    ) -> TrailResult<AuditEntry> {
        self.append_inner(entity_type, entity_id, event_type, payload, actor, None)
    }

    /// Like [`append`](Self::append), attaching a non-repudiation signature
    /// produced by the signature service over the canonical payload.
    pub fn append_signed(
        &self,
        entity_type: &str,
        entity_id: &str,
        event_type: &str,
        payload: serde_json::Value,
        actor: ActorRef,
        signature: EntrySignature,
    ) -> TrailResult<AuditEntry> {
        self.append_inner(
            entity_type,
            entity_id,
            event_type,
            payload,
            actor,
            Some(signature),
        )
    }

    fn append_inner(
        &self,
        entity_type: &str,
        entity_id: &str,
        event_type: &str,
        payload: serde_json::Value,
        actor: ActorRef,
        signature: Option<EntrySignature>,
    ) -> TrailResult<AuditEntry> {
        // Canonicalize before taking any lock — a bad payload must not hold
        // up other writers.
        let payload_canonical = canonicalize(&payload)?;

        let key = StreamKey::new(entity_type, entity_id);
        let stream = self.stream_handle(&key)?;
        let mut state = self.lock_stream(&stream, &key)?;

        let id = Uuid::new_v4();
        let recorded_at = Utc::now();
        let sequence = state.next_sequence;
        let prev_hash = state.last_hash.clone();

        let current_hash = hash_entry(
            &id,
            entity_type,
            entity_id,
            event_type,
            &actor,
            sequence,
            &recorded_at,
            &prev_hash,
            &payload_canonical,
        );

        let entry = AuditEntry {
            id,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type: event_type.to_string(),
            actor,
            sequence,
            recorded_at,
            payload,
            prev_hash,
            current_hash: current_hash.clone(),
            signature,
            anchor_snapshot_id: None,
        };

        state.entries.push(entry.clone());
        state.next_sequence += 1;
        state.last_hash = current_hash;

        // Index while still holding the stream lock: the instant any scan
        // can see the entry it must also be resolvable by id, or an anchor
        // cycle could select it and then fail to mark it.  No other path
        // holds the index lock while waiting on a stream lock, so the
        // nesting cannot deadlock.
        self.index
            .write()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("entry index lock poisoned: {e}"),
            })?
            .insert(id, key.clone());
        drop(state);

        debug!(
            stream = %key,
            entry_id = %id,
            sequence,
            event_type,
            "audit entry appended"
        );

        Ok(entry)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// All entries for an entity stream, in insertion order.
    ///
    /// Returns `NotFound` for a stream no entry has ever been appended to.
    /// The returned vector is a snapshot-in-time: a concurrent append may
    /// not be visible, which is acceptable for verification reads.
    pub fn stream_for(&self, entity_type: &str, entity_id: &str) -> TrailResult<Vec<AuditEntry>> {
        let key = StreamKey::new(entity_type, entity_id);
        let stream = self
            .existing_stream_handle(&key)
            .ok_or_else(|| TrailError::NotFound {
                kind: "entity stream",
                id: key.to_string(),
            })?;
        let state = self.lock_stream(&stream, &key)?;
        Ok(state.entries.clone())
    }

    /// Look up a single entry by id.
    pub fn entry(&self, entry_id: Uuid) -> TrailResult<AuditEntry> {
        let key = self.key_for(entry_id)?;
        let stream = self
            .existing_stream_handle(&key)
            .ok_or_else(|| TrailError::NotFound {
                kind: "entity stream",
                id: key.to_string(),
            })?;
        let state = self.lock_stream(&stream, &key)?;
        state
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or_else(|| TrailError::NotFound {
                kind: "audit entry",
                id: entry_id.to_string(),
            })
    }

    /// All entries not yet covered by an anchor snapshot, ordered
    /// deterministically by `(recorded_at, id)`.
    pub fn unanchored_entries(&self) -> TrailResult<Vec<AuditEntry>> {
        let handles: Vec<(StreamKey, Arc<Mutex<StreamState>>)> = {
            let streams = self
                .streams
                .read()
                .map_err(|e| TrailError::ConcurrencyConflict {
                    reason: format!("stream map lock poisoned: {e}"),
                })?;
            streams
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect()
        };

        let mut pending = Vec::new();
        for (key, stream) in handles {
            let state = self.lock_stream(&stream, &key)?;
            pending.extend(state.entries.iter().filter(|e| !e.is_anchored()).cloned());
        }

        pending.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(pending)
    }

    /// Number of distinct entity streams seen so far.
    pub fn stream_count(&self) -> usize {
        self.streams
            .read()
            .map(|s| s.len())
            .unwrap_or(0)
    }

    // ── Anchoring transition ──────────────────────────────────────────────────

    /// Mark every entry in `entry_ids` as anchored in `snapshot_id`.
    ///
    /// This is the only mutation the store permits on an existing entry, and
    /// it happens at most once per entry: any already-anchored entry fails
    /// the whole call with `Integrity` before anything is written.  The
    /// anchor scheduler's single-flight guard ensures no concurrent caller
    /// can interleave between the check pass and the write pass; appends
    /// never set `anchor_snapshot_id`, so they cannot invalidate the check.
    pub fn mark_anchored(&self, entry_ids: &[Uuid], snapshot_id: Uuid) -> TrailResult<()> {
        for id in entry_ids {
            let entry = self.entry(*id)?;
            if let Some(existing) = entry.anchor_snapshot_id {
                return Err(TrailError::Integrity {
                    reason: format!(
                        "entry {id} is already anchored in snapshot {existing}"
                    ),
                });
            }
        }

        for id in entry_ids {
            let key = self.key_for(*id)?;
            let stream = self
                .existing_stream_handle(&key)
                .ok_or_else(|| TrailError::NotFound {
                    kind: "entity stream",
                    id: key.to_string(),
                })?;
            let mut state = self.lock_stream(&stream, &key)?;
            if let Some(entry) = state.entries.iter_mut().find(|e| e.id == *id) {
                entry.anchor_snapshot_id = Some(snapshot_id);
            }
        }

        debug!(
            snapshot_id = %snapshot_id,
            entry_count = entry_ids.len(),
            "entries marked anchored"
        );
        Ok(())
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Get or create the mutex handle for a stream.
    fn stream_handle(&self, key: &StreamKey) -> TrailResult<Arc<Mutex<StreamState>>> {
        if let Some(handle) = self.existing_stream_handle(key) {
            return Ok(handle);
        }
        let mut streams = self
            .streams
            .write()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("stream map lock poisoned: {e}"),
            })?;
        Ok(Arc::clone(
            streams
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(StreamState::new()))),
        ))
    }

    fn existing_stream_handle(&self, key: &StreamKey) -> Option<Arc<Mutex<StreamState>>> {
        self.streams
            .read()
            .ok()
            .and_then(|streams| streams.get(key).map(Arc::clone))
    }

    fn key_for(&self, entry_id: Uuid) -> TrailResult<StreamKey> {
        self.index
            .read()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("entry index lock poisoned: {e}"),
            })?
            .get(&entry_id)
            .cloned()
            .ok_or_else(|| TrailError::NotFound {
                kind: "audit entry",
                id: entry_id.to_string(),
            })
    }

    /// Acquire a stream's mutex with a bounded wait.
    ///
    /// Spins on `try_lock` until the deadline; contention beyond the bound
    /// surfaces as `ConcurrencyConflict` so callers can retry instead of
    /// blocking a request handler indefinitely.
    fn lock_stream<'a>(
        &self,
        stream: &'a Mutex<StreamState>,
        key: &StreamKey,
    ) -> TrailResult<MutexGuard<'a, StreamState>> {
        let deadline = Instant::now() + self.lock_wait;
        loop {
            match stream.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(e)) => {
                    return Err(TrailError::ConcurrencyConflict {
                        reason: format!("stream '{key}' lock poisoned: {e}"),
                    });
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(TrailError::ConcurrencyConflict {
                            reason: format!(
                                "timed out waiting for stream '{key}' after {:?}",
                                self.lock_wait
                            ),
                        });
                    }
                    std::thread::yield_now();
                }
            }
        }
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use uuid::Uuid;

    use agritrail_contracts::{actor::ActorRef, entry::AuditEntry, error::TrailError};

    use super::ChainStore;

    fn actor() -> ActorRef {
        ActorRef::new("u-100", "farmhand", "Sam Byrne")
    }

    // ── Append / linkage ──────────────────────────────────────────────────────

    /// Sequential appends produce a linearly linked chain starting at the
    /// genesis sentinel.
    #[test]
    fn appends_link_via_prev_hash() {
        let store = ChainStore::new();
        let a = store
            .append("Animal", "42", "updated", json!({ "field": "x", "value": 1 }), actor())
            .unwrap();
        let b = store
            .append("Animal", "42", "updated", json!({ "field": "x", "value": 2 }), actor())
            .unwrap();

        assert_eq!(a.sequence, 0);
        assert_eq!(a.prev_hash, AuditEntry::GENESIS_HASH);
        assert_eq!(b.sequence, 1);
        assert_eq!(b.prev_hash, a.current_hash);
    }

    /// `stream_for` returns entries in insertion order.
    #[test]
    fn stream_for_preserves_order() {
        let store = ChainStore::new();
        let a = store
            .append("Animal", "42", "updated", json!({ "n": 1 }), actor())
            .unwrap();
        let b = store
            .append("Animal", "42", "updated", json!({ "n": 2 }), actor())
            .unwrap();

        let stream = store.stream_for("Animal", "42").unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[0].id, a.id);
        assert_eq!(stream[1].id, b.id);
    }

    /// Streams for different entities are independent chains.
    #[test]
    fn streams_are_independent() {
        let store = ChainStore::new();
        store
            .append("Animal", "42", "updated", json!({}), actor())
            .unwrap();
        let first_of_other = store
            .append("Field", "north-paddock", "plowed", json!({}), actor())
            .unwrap();

        assert_eq!(first_of_other.sequence, 0);
        assert_eq!(first_of_other.prev_hash, AuditEntry::GENESIS_HASH);
        assert_eq!(store.stream_count(), 2);
    }

    #[test]
    fn unknown_stream_is_not_found() {
        let store = ChainStore::new();
        let err = store.stream_for("Animal", "missing").unwrap_err();
        assert!(matches!(err, TrailError::NotFound { .. }));
    }

    #[test]
    fn entry_lookup_by_id() {
        let store = ChainStore::new();
        let appended = store
            .append("Animal", "42", "updated", json!({ "n": 1 }), actor())
            .unwrap();

        let found = store.entry(appended.id).unwrap();
        assert_eq!(found.current_hash, appended.current_hash);

        let err = store.entry(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, TrailError::NotFound { .. }));
    }

    // ── Concurrency ───────────────────────────────────────────────────────────

    /// 50 parallel appends to the same entity must yield a 50-entry chain
    /// with a single valid linear order and zero corrupted prev_hash links.
    #[test]
    fn concurrent_appends_serialize_per_stream() {
        let store = Arc::new(ChainStore::new());

        let handles: Vec<_> = (0..50)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .append("Animal", "42", "updated", json!({ "n": n }), actor())
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stream = store.stream_for("Animal", "42").unwrap();
        assert_eq!(stream.len(), 50);

        let mut expected_prev = AuditEntry::GENESIS_HASH.to_string();
        for (idx, entry) in stream.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64, "sequence gap at {idx}");
            assert_eq!(entry.prev_hash, expected_prev, "broken link at {idx}");
            expected_prev = entry.current_hash.clone();
        }
    }

    /// A stream lock held past the bounded wait surfaces
    /// `ConcurrencyConflict` instead of blocking the caller indefinitely,
    /// and the append succeeds once the lock is released.
    #[test]
    fn contended_stream_lock_times_out() {
        use std::time::Duration;

        use super::StreamKey;

        let store = ChainStore::with_lock_wait(Duration::from_millis(10));
        store
            .append("Animal", "42", "updated", json!({ "n": 1 }), actor())
            .unwrap();

        let handle = store
            .streams
            .read()
            .unwrap()
            .get(&StreamKey::new("Animal", "42"))
            .cloned()
            .unwrap();
        let guard = handle.lock().unwrap();

        let err = store
            .append("Animal", "42", "updated", json!({ "n": 2 }), actor())
            .unwrap_err();
        assert!(matches!(err, TrailError::ConcurrencyConflict { .. }));

        drop(guard);
        store
            .append("Animal", "42", "updated", json!({ "n": 2 }), actor())
            .unwrap();
        assert_eq!(store.stream_for("Animal", "42").unwrap().len(), 2);
    }

    /// Appends to distinct streams running in parallel all land.
    #[test]
    fn concurrent_appends_to_distinct_streams() {
        let store = Arc::new(ChainStore::new());

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        store
                            .append("Animal", &n.to_string(), "updated", json!({ "i": i }), actor())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for n in 0..8 {
            let stream = store.stream_for("Animal", &n.to_string()).unwrap();
            assert_eq!(stream.len(), 10, "stream {n} incomplete");
        }
    }

    // ── Anchoring transition ──────────────────────────────────────────────────

    #[test]
    fn unanchored_entries_ordered_and_filtered() {
        let store = ChainStore::new();
        let a = store
            .append("Animal", "42", "updated", json!({ "n": 1 }), actor())
            .unwrap();
        let b = store
            .append("Field", "south", "plowed", json!({ "n": 2 }), actor())
            .unwrap();

        let pending = store.unanchored_entries().unwrap();
        assert_eq!(pending.len(), 2);

        store.mark_anchored(&[a.id], Uuid::new_v4()).unwrap();
        let pending = store.unanchored_entries().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
    }

    /// Re-anchoring an entry is an integrity violation and must not write
    /// anything.
    #[test]
    fn mark_anchored_rejects_double_anchor() {
        let store = ChainStore::new();
        let a = store
            .append("Animal", "42", "updated", json!({}), actor())
            .unwrap();
        let b = store
            .append("Animal", "42", "updated", json!({}), actor())
            .unwrap();

        let first_snapshot = Uuid::new_v4();
        store.mark_anchored(&[a.id], first_snapshot).unwrap();

        let err = store
            .mark_anchored(&[b.id, a.id], Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, TrailError::Integrity { .. }));

        // The failed call must not have touched b.
        assert!(!store.entry(b.id).unwrap().is_anchored());
        assert_eq!(
            store.entry(a.id).unwrap().anchor_snapshot_id,
            Some(first_snapshot)
        );
    }

    // ── Signatures ────────────────────────────────────────────────────────────

    #[test]
    fn append_signed_carries_signature() {
        let store = ChainStore::new();
        let signature = agritrail_contracts::entry::EntrySignature {
            key_id: Uuid::new_v4(),
            signature: "de".repeat(64),
        };

        let entry = store
            .append_signed(
                "Animal",
                "42",
                "vaccination_approved",
                json!({ "vaccine": "bluetongue" }),
                actor(),
                signature.clone(),
            )
            .unwrap();

        assert_eq!(entry.signature, Some(signature));
    }
}
