//! Configuration Management
//!
//! Handles persistent tuning configuration for the framework: poll
//! cadence and the management-API endpoint. These are configuration, not
//! constants, so fast and slow provisioning paths can be tuned without a
//! rebuild.

use crate::poller::PollerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_poll_timeout_secs() -> u64 {
    DEFAULT_POLL_TIMEOUT_SECS
}

/// Framework tuning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// Delay between long-running-operation status probes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Deadline for a long-running operation to reach a terminal state
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Management-API endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            endpoint: None,
        }
    }
}

impl FrameworkConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("strata").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective endpoint (config > env > default)
    pub fn effective_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .or_else(|| std::env::var("STRATA_ENDPOINT").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Set endpoint and save
    pub fn set_endpoint(&mut self, endpoint: &str) -> anyhow::Result<()> {
        self.endpoint = Some(endpoint.to_string());
        self.save()
    }

    /// Poller settings derived from this configuration
    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}
