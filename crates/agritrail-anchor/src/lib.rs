//! # agritrail-anchor
//!
//! Merkle batching and external-ledger anchoring for the AGRITRAIL audit
//! core.
//!
//! ## Overview
//!
//! The chain store guarantees per-entity integrity; this crate adds external
//! attestation.  A scheduler periodically gathers unanchored entries, builds
//! a Merkle tree over their hashes, publishes the root to a ledger through
//! the narrow [`LedgerClient`] interface, and records an `AnchorSnapshot`
//! binding the batch to the confirmed transaction.  Later, an inclusion
//! proof against the snapshot's root proves an individual entry was part of
//! the anchored batch.

pub mod config;
pub mod ledger;
pub mod merkle;
pub mod scheduler;
pub mod snapshot_store;

pub use config::AnchorConfig;
pub use ledger::{InMemoryLedger, LedgerClient, LedgerReceipt};
pub use merkle::{verify_path, MerkleTree, PathStep, Side};
pub use scheduler::{AnchorOutcome, AnchorScheduler};
pub use snapshot_store::SnapshotStore;
