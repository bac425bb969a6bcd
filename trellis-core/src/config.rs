//! Runtime configuration.
//!
//! Configuration is a small serde document. Every field has a default, so an
//! empty object (`{}`) is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Log a warning when a signal is read outside any computation.
    pub warn_untracked_reads: bool,

    /// Length of one frame tick, in milliseconds.
    pub frame_interval_ms: u64,

    /// Warn when computations nest deeper than this. Zero disables the check.
    pub max_effect_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            warn_untracked_reads: true,
            frame_interval_ms: 16,
            max_effect_depth: 0,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
