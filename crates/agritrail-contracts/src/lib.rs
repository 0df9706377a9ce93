//! # agritrail-contracts
//!
//! Shared types and error contracts for the AGRITRAIL audit core.
//!
//! All crates in the workspace import from here.  No business logic lives in
//! this crate — only data definitions and error types.

pub mod actor;
pub mod entry;
pub mod error;
pub mod keypair;
pub mod snapshot;

pub use actor::ActorRef;
pub use entry::{AuditEntry, EntrySignature};
pub use error::{TrailError, TrailResult};
pub use keypair::KeyPairRecord;
pub use snapshot::AnchorSnapshot;

// ── Tests ─────────────────────────────────────────────────────────────────────
