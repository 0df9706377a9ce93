//! The anchor scheduler: periodic Merkle batching of unanchored entries.
//!
//! One cycle selects all currently unanchored entries (deterministically
//! ordered, bounded by the configured batch size), builds a Merkle tree over
//! their `current_hash` values, submits the root to the external ledger,
//! and — only after the ledger confirms — records an `AnchorSnapshot` and
//! marks the covered entries anchored.  A failed submission aborts the cycle
//! with nothing marked; the next tick retries under exponential backoff.
//!
//! Only one cycle runs at a time (non-blocking `try_lock` single-flight), so
//! two cycles can never select overlapping unanchored sets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agritrail_chain::ChainStore;
use agritrail_contracts::{
    error::{TrailError, TrailResult},
    snapshot::AnchorSnapshot,
};

use crate::{
    config::AnchorConfig, ledger::LedgerClient, merkle::MerkleTree, snapshot_store::SnapshotStore,
};

/// What one call to `run_anchor_cycle` did.
#[derive(Debug)]
pub enum AnchorOutcome {
    /// A snapshot was recorded and its entries marked anchored.
    Anchored(AnchorSnapshot),

    /// Fewer than `min_batch_size` entries were pending; nothing was done.
    BelowMinimum { pending: usize },

    /// Another cycle is already running; this call did nothing.
    CycleInProgress,

    /// A recent submission failure put the scheduler in backoff.
    BackingOff { remaining: Duration },
}

/// Retry state after failed ledger submissions.
struct BackoffState {
    consecutive_failures: u32,
    not_before: Option<Instant>,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            not_before: None,
        }
    }
}

/// Periodically batches unanchored entries into externally anchored
/// Merkle snapshots.
pub struct AnchorScheduler {
    store: Arc<ChainStore>,
    snapshots: Arc<SnapshotStore>,
    ledger: Arc<dyn LedgerClient>,
    config: AnchorConfig,
    cycle_guard: Mutex<()>,
    backoff: Mutex<BackoffState>,
}

impl AnchorScheduler {
    pub fn new(
        store: Arc<ChainStore>,
        snapshots: Arc<SnapshotStore>,
        ledger: Arc<dyn LedgerClient>,
        config: AnchorConfig,
    ) -> Self {
        Self {
            store,
            snapshots,
            ledger,
            config,
            cycle_guard: Mutex::new(()),
            backoff: Mutex::new(BackoffState::new()),
        }
    }

    /// Run one anchor cycle.
    ///
    /// Re-running with no new entries anchors nothing: already-anchored
    /// entries are never selected, so the cycle is idempotent.
    ///
    /// # Errors
    ///
    /// `AnchorSubmission` when the ledger fails or times out.  The cycle
    /// aborts with no entries marked and no snapshot written; backoff is
    /// armed for subsequent ticks.  Callers running this from a background
    /// loop should log the error and carry on — anchoring failures never
    /// fail a user-facing request.
    pub fn run_anchor_cycle(&self) -> TrailResult<AnchorOutcome> {
        let _guard = match self.cycle_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!("anchor cycle already in progress; skipping");
                return Ok(AnchorOutcome::CycleInProgress);
            }
            Err(TryLockError::Poisoned(e)) => {
                return Err(TrailError::ConcurrencyConflict {
                    reason: format!("anchor cycle guard poisoned: {e}"),
                });
            }
        };

        if let Some(remaining) = self.backoff_remaining()? {
            debug!(?remaining, "in submission backoff; skipping cycle");
            return Ok(AnchorOutcome::BackingOff { remaining });
        }

        let mut pending = self.store.unanchored_entries()?;
        if pending.len() < self.config.min_batch_size {
            debug!(
                pending = pending.len(),
                min_batch_size = self.config.min_batch_size,
                "not enough pending entries to anchor"
            );
            return Ok(AnchorOutcome::BelowMinimum {
                pending: pending.len(),
            });
        }
        pending.truncate(self.config.max_batch_size);

        let leaves: Vec<String> = pending.iter().map(|e| e.current_hash.clone()).collect();
        let tree = MerkleTree::from_leaf_hex(&leaves)?;
        let root = tree.root_hex();

        let receipt = match self.ledger.submit_root(&root, self.config.submit_timeout()) {
            Ok(receipt) => receipt,
            Err(e) => {
                let delay = self.record_failure()?;
                warn!(
                    error = %e,
                    retry_backoff = ?delay,
                    batch_size = pending.len(),
                    "ledger submission failed; entries remain unanchored"
                );
                return Err(e);
            }
        };
        self.reset_backoff()?;

        let entry_ids: Vec<Uuid> = pending.iter().map(|e| e.id).collect();
        let snapshot = AnchorSnapshot {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            entry_ids: entry_ids.clone(),
            merkle_root: root,
            transaction_id: receipt.transaction_id.clone(),
            block_reference: receipt.block_reference,
            explorer_url: Some(self.ledger.explorer_url(&receipt.transaction_id)),
        };

        // Marking and snapshot record form one logical unit: the
        // single-flight guard is held across both, and nothing else writes
        // `anchor_snapshot_id`.  Marking first means a failure between the
        // two steps leaves no orphaned snapshot for a later cycle to
        // double-anchor.
        self.store.mark_anchored(&entry_ids, snapshot.id)?;
        self.snapshots.insert(snapshot.clone())?;

        info!(
            snapshot_id = %snapshot.id,
            entry_count = snapshot.entry_count(),
            merkle_root = %snapshot.merkle_root,
            transaction_id = %snapshot.transaction_id,
            "batch anchored"
        );
        Ok(AnchorOutcome::Anchored(snapshot))
    }

    /// Run `run_anchor_cycle` on a fixed interval in a background thread.
    ///
    /// Cycle errors are logged and swallowed — anchoring is asynchronous to
    /// request handling and must never take the process down.  The loop
    /// checks `shutdown` between short sleep slices, so an in-flight cycle
    /// finishes and the thread exits promptly after the flag is set.
    pub fn spawn(
        scheduler: Arc<Self>,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                match scheduler.run_anchor_cycle() {
                    Ok(outcome) => debug!(?outcome, "anchor cycle finished"),
                    Err(e) => warn!(error = %e, "anchor cycle failed; retrying next tick"),
                }

                let mut slept = Duration::ZERO;
                while slept < interval && !shutdown.load(Ordering::Relaxed) {
                    let slice = Duration::from_millis(50).min(interval - slept);
                    thread::sleep(slice);
                    slept += slice;
                }
            }
        })
    }

    // ── Backoff bookkeeping ───────────────────────────────────────────────────

    fn backoff_remaining(&self) -> TrailResult<Option<Duration>> {
        let backoff = self.lock_backoff()?;
        Ok(backoff
            .not_before
            .and_then(|t| t.checked_duration_since(Instant::now())))
    }

    fn record_failure(&self) -> TrailResult<Duration> {
        let mut backoff = self.lock_backoff()?;
        backoff.consecutive_failures = backoff.consecutive_failures.saturating_add(1);

        let exponent = backoff.consecutive_failures.saturating_sub(1).min(16);
        let delay = self
            .config
            .base_backoff()
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_backoff());
        backoff.not_before = Some(Instant::now() + delay);
        Ok(delay)
    }

    fn reset_backoff(&self) -> TrailResult<()> {
        let mut backoff = self.lock_backoff()?;
        *backoff = BackoffState::new();
        Ok(())
    }

    fn lock_backoff(&self) -> TrailResult<std::sync::MutexGuard<'_, BackoffState>> {
        self.backoff
            .lock()
            .map_err(|e| TrailError::ConcurrencyConflict {
                reason: format!("backoff state lock poisoned: {e}"),
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
