//! Anchor scheduler configuration, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use agritrail_contracts::error::{TrailError, TrailResult};

/// Batching and retry policy for the anchor scheduler.
///
/// Construct via `AnchorConfig::default()`, `from_toml_str`, or `from_file`:
///
/// ```toml
/// min_batch_size = 4
/// max_batch_size = 128
/// submit_timeout_secs = 30
/// base_backoff_secs = 5
/// max_backoff_secs = 300
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// A cycle with fewer pending entries than this is a no-op — avoids
    /// trivial one-leaf trees and excessive anchoring cost.
    pub min_batch_size: usize,

    /// Upper bound on entries covered by one snapshot.
    pub max_batch_size: usize,

    /// Bounded wait for a ledger submission.
    pub submit_timeout_secs: u64,

    /// First retry delay after a failed submission; doubles per consecutive
    /// failure up to `max_backoff_secs`.
    pub base_backoff_secs: u64,

    pub max_backoff_secs: u64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            min_batch_size: 2,
            max_batch_size: 256,
            submit_timeout_secs: 30,
            base_backoff_secs: 5,
            max_backoff_secs: 300,
        }
    }
}

impl AnchorConfig {
    /// Parse `s` as TOML anchor configuration.
    pub fn from_toml_str(s: &str) -> TrailResult<Self> {
        let config: AnchorConfig = toml::from_str(s).map_err(|e| TrailError::Config {
            reason: format!("failed to parse anchor config TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML anchor configuration.
    pub fn from_file(path: &Path) -> TrailResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TrailError::Config {
            reason: format!("failed to read anchor config '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_secs(self.base_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    fn validate(&self) -> TrailResult<()> {
        if self.min_batch_size == 0 {
            return Err(TrailError::Config {
                reason: "min_batch_size must be at least 1".to_string(),
            });
        }
        if self.max_batch_size < self.min_batch_size {
            return Err(TrailError::Config {
                reason: format!(
                    "max_batch_size ({}) must be >= min_batch_size ({})",
                    self.max_batch_size, self.min_batch_size
                ),
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
