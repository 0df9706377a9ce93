//! Actor identity as supplied by the surrounding application.
//!
//! The audit core never resolves identities itself — the request layer
//! looks up the acting user and hands a ready-made `ActorRef` to the chain
//! store at append time.

use serde::{Deserialize, Serialize};

/// The identity of the user or service performing an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    /// Stable identifier of the actor (application user id).
    pub id: String,

    /// Role the actor held at the time of the action (e.g. "veterinarian").
    pub role: String,

    /// Human-readable name for audit display; not part of any hash input.
    pub display_name: String,
}

impl ActorRef {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            display_name: display_name.into(),
        }
    }
}
