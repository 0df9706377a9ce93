//! # agritrail-verify
//!
//! Chain-continuity and inclusion-proof verification for the AGRITRAIL
//! audit core, plus certificate data assembly for the external document
//! renderer.
//!
//! Verification results are data, not errors: a broken chain comes back as
//! `ChainVerification { is_valid: false, .. }` because "broken" is an
//! expected, meaningful outcome of an audit.

pub mod certificate;
pub mod engine;

pub use certificate::CertificateData;
pub use engine::{verify_entries, ChainVerification, InclusionVerification, VerificationEngine};
