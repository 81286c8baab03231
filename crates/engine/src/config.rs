// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration

use crate::{env, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables shared by every execution of one [`crate::JobOperator`].
///
/// ```toml
/// max_workers = 4
/// default_item_count = 100
/// split_timeout_ms = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on partitions running at once across the engine.
    pub max_workers: usize,
    /// Commit interval of chunks that declare no item count.
    pub default_item_count: u32,
    /// How long a split waits for its flows before failing.
    pub split_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            default_item_count: 10,
            split_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    bw_core::setters! {
        set {
            max_workers: usize,
            default_item_count: u32,
        }
        option {
            split_timeout_ms: u64,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?.with_env_overrides())
    }

    /// Apply `BW_MAX_WORKERS` and `BW_SPLIT_TIMEOUT_MS` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env::max_workers() {
            self.max_workers = n;
        }
        if let Some(timeout) = env::split_timeout() {
            self.split_timeout_ms = Some(timeout.as_millis() as u64);
        }
        self
    }

    pub(crate) fn split_timeout(&self) -> Option<Duration> {
        self.split_timeout_ms.map(Duration::from_millis)
    }

    /// Worker permits; never zero so partitions always make progress.
    pub(crate) fn worker_permits(&self) -> usize {
        self.max_workers.max(1)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
