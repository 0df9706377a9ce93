//! Error types for the AGRITRAIL audit core.
//!
//! All fallible operations return `TrailResult<T>`.  Variants carry enough
//! context to produce actionable operator logs.  Note what is *not* an
//! error: a broken chain or a failed inclusion proof is reported as data
//! (`is_valid: false`) by the verification engine — "broken" is a meaningful
//! outcome, not a programming fault.

use thiserror::Error;

/// The unified error type for the AGRITRAIL crates.
#[derive(Debug, Error)]
pub enum TrailError {
    /// A referenced entity stream, entry, snapshot, or key does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An append-only invariant would be violated (e.g. re-anchoring an
    /// already-anchored entry, or a snapshot referencing an unknown entry).
    ///
    /// Chain breaks detected during verification are NOT reported through
    /// this variant — they come back as `ChainVerification` data.
    #[error("integrity violation: {reason}")]
    Integrity { reason: String },

    /// The external ledger rejected, timed out on, or was unreachable for a
    /// root submission.  The anchor cycle aborts; covered entries remain
    /// unanchored and are retried on a later tick.
    #[error("anchor submission failed: {reason}")]
    AnchorSubmission { reason: String },

    /// A stream lock could not be acquired within the bounded wait.
    /// The caller may retry the append.
    #[error("concurrency conflict: {reason}")]
    ConcurrencyConflict { reason: String },

    /// A payload could not be canonicalized for hashing.
    #[error("canonicalization failed: {reason}")]
    Canonicalization { reason: String },

    /// Key or signature bytes are malformed (wrong length, bad hex).
    #[error("invalid key material: {reason}")]
    KeyMaterial { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the AGRITRAIL crates.
pub type TrailResult<T> = Result<T, TrailError>;
