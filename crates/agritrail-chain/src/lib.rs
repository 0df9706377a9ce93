//! # agritrail-chain
//!
//! Canonical hashing and the per-entity, append-only SHA-256 hash-chain
//! store for the AGRITRAIL audit core.
//!
//! ## Overview
//!
//! Every mutating domain action is appended as an `AuditEntry` that links to
//! the previous entry of the same entity stream via its SHA-256 hash.
//! Tampering with any entry — even a single byte — breaks the chain and is
//! detected by the verification engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agritrail_chain::ChainStore;
//! use agritrail_contracts::ActorRef;
//!
//! let store = ChainStore::new();
//! let entry = store.append(
//!     "Animal", "42", "weight_recorded",
//!     serde_json::json!({ "weight_kg": 412 }),
//!     ActorRef::new("u-100", "farmhand", "Sam Byrne"),
//! )?;
//! let stream = store.stream_for("Animal", "42")?;
//! ```

pub mod canonical;
pub mod hash;
pub mod store;

pub use canonical::canonicalize;
pub use hash::hash_entry;
pub use store::{ChainStore, StreamKey};
