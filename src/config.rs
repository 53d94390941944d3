//! Sync configuration
//!
//! Usually loaded from a `sync.toml` next to the board data:
//!
//! ```toml
//! request_timeout_ms = 5000
//! rollback = "compensate"
//! verify_after_commit = true
//! ```

use crate::error::{ReorderError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// What happens after the local snapshot is restored on a failed change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackPolicy {
    /// Restore the local snapshot only; the server keeps any writes that landed
    Local,
    /// Also write the pre-change placement back for every request that
    /// succeeded or may have landed after a network failure
    #[default]
    Compensate,
    /// Also refetch the board and treat the server state as authoritative
    Refetch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-request timeout; an expired request counts as a network failure
    pub request_timeout_ms: Option<u64>,
    pub rollback: RollbackPolicy,
    /// Refetch and compare placements after every successful commit
    pub verify_after_commit: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            rollback: RollbackPolicy::Compensate,
            verify_after_commit: false,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ReorderError::ConfigError(e.to_string()))
    }

    /// Loads configuration from a TOML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&contents)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
