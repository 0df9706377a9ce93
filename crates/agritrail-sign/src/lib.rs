//! # agritrail-sign
//!
//! Ed25519 signature service for non-repudiable approvals in the AGRITRAIL
//! audit core.
//!
//! The hash chain guarantees order and non-tampering; signatures add
//! attribution for events that require it (e.g. a veterinarian approving a
//! treatment).  Keys are generated per actor, rotated by supersession, and
//! the private halves never leave the service.

pub mod service;

pub use service::SignatureService;
