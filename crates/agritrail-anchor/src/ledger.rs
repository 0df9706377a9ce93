//! The narrow external-ledger interface.
//!
//! The ledger is used purely as a trusted timestamping/anchoring point: the
//! core submits a Merkle root, the ledger returns a transaction reference.
//! No blockchain semantics leak into the core beyond this trait.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use agritrail_contracts::error::{TrailError, TrailResult};

/// A confirmed root submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub transaction_id: String,
    pub block_reference: String,
    pub confirmed_at: DateTime<Utc>,
}

/// Client for the external anchoring ledger.
///
/// Submission is a blocking, potentially slow and unreliable network
/// operation: implementations must respect `timeout` so a stuck submission
/// cannot block subsequent anchor cycles indefinitely.
pub trait LedgerClient: Send + Sync {
    /// Submit a Merkle root; return only once the ledger has confirmed it.
    ///
    /// # Errors
    ///
    /// `AnchorSubmission` when the ledger is unreachable, rejects the root,
    /// or the bounded `timeout` elapses.
    fn submit_root(&self, root_hex: &str, timeout: Duration) -> TrailResult<LedgerReceipt>;

    /// Public explorer link for a confirmed transaction.
    fn explorer_url(&self, transaction_id: &str) -> String;
}

// ── In-memory implementation ──────────────────────────────────────────────────

/// An in-process ledger for tests and the demo.
///
/// Confirms every submission instantly and records it.  `fail_times(n)`
/// injects `n` consecutive submission failures, which is how the scheduler's
/// abort/backoff/retry behavior is exercised.
pub struct InMemoryLedger {
    base_url: String,
    submissions: Mutex<Vec<(String, LedgerReceipt)>>,
    next_tx: AtomicU64,
    failures_remaining: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            base_url: "https://ledger.example".to_string(),
            submissions: Mutex::new(Vec::new()),
            next_tx: AtomicU64::new(1),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` submissions fail with `AnchorSubmission`.
    pub fn fail_times(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of confirmed submissions so far.
    pub fn submission_count(&self) -> usize {
        self.submissions
            .lock()
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// The roots confirmed so far, in submission order.
    pub fn submitted_roots(&self) -> Vec<String> {
        self.submissions
            .lock()
            .map(|s| s.iter().map(|(root, _)| root.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerClient for InMemoryLedger {
    fn submit_root(&self, root_hex: &str, _timeout: Duration) -> TrailResult<LedgerReceipt> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TrailError::AnchorSubmission {
                reason: "injected ledger failure".to_string(),
            });
        }

        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        let receipt = LedgerReceipt {
            transaction_id: format!("tx-{n:06}"),
            block_reference: format!("block-{n}"),
            confirmed_at: Utc::now(),
        };

        self.submissions
            .lock()
            .map_err(|e| TrailError::AnchorSubmission {
                reason: format!("ledger state lock poisoned: {e}"),
            })?
            .push((root_hex.to_string(), receipt.clone()));

        debug!(
            root = root_hex,
            transaction_id = %receipt.transaction_id,
            "root confirmed by in-memory ledger"
        );
        Ok(receipt)
    }

    fn explorer_url(&self, transaction_id: &str) -> String {
        format!("{}/tx/{transaction_id}", self.base_url)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use agritrail_contracts::error::TrailError;

    use super::{InMemoryLedger, LedgerClient};

    #[test]
    fn submissions_are_recorded_in_order() {
        let ledger = InMemoryLedger::new();
        let a = ledger
            .submit_root("aa", Duration::from_secs(1))
            .unwrap();
        let b = ledger
            .submit_root("bb", Duration::from_secs(1))
            .unwrap();

        assert_ne!(a.transaction_id, b.transaction_id);
        assert_eq!(ledger.submitted_roots(), vec!["aa", "bb"]);
    }

    #[test]
    fn injected_failures_then_recovery() {
        let ledger = InMemoryLedger::new();
        ledger.fail_times(2);

        for _ in 0..2 {
            let err = ledger.submit_root("aa", Duration::from_secs(1)).unwrap_err();
            assert!(matches!(err, TrailError::AnchorSubmission { .. }));
        }

        assert!(ledger.submit_root("aa", Duration::from_secs(1)).is_ok());
        assert_eq!(ledger.submission_count(), 1);
    }

    #[test]
    fn explorer_url_embeds_transaction() {
        let ledger = InMemoryLedger::new();
        assert_eq!(
            ledger.explorer_url("tx-000007"),
            "https://ledger.example/tx/tx-000007"
        );
    }
}
