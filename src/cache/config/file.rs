//! Loading configuration from TOML or JSON files
//!
//! Every field is optional in the file; missing fields keep the value of the
//! configuration being merged into.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::OptimisticConfig;
use crate::cache::optimistic::retry::BackoffStrategy;
use crate::cache::types::OptimistResult;

/// Configuration file format
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub optimistic: OptimisticFileConfig,
}

/// `[optimistic]` section of a configuration file
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct OptimisticFileConfig {
    pub enable_rollback: Option<bool>,
    pub rollback_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub backoff: Option<BackoffStrategy>,
    pub cleanup_delay_ms: Option<u64>,
    pub notify_pending: Option<bool>,
    pub notify_success: Option<bool>,
}

impl OptimisticFileConfig {
    /// Overlay the fields present in the file onto `base`
    pub fn merge_into(&self, mut base: OptimisticConfig) -> OptimisticConfig {
        if let Some(enable_rollback) = self.enable_rollback {
            base.enable_rollback = enable_rollback;
        }
        if let Some(timeout) = self.rollback_timeout_ms {
            base.rollback_timeout_ms = timeout;
        }
        if let Some(max_retries) = self.max_retries {
            base.max_retries = max_retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            base.retry_delay_ms = delay;
        }
        if let Some(backoff) = self.backoff {
            base.backoff = backoff;
        }
        if let Some(delay) = self.cleanup_delay_ms {
            base.cleanup_delay_ms = delay;
        }
        if let Some(notify) = self.notify_pending {
            base.notify_pending = notify;
        }
        if let Some(notify) = self.notify_success {
            base.notify_success = notify;
        }
        base
    }
}

impl ConfigFile {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> OptimistResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse JSON text
    pub fn from_json_str(content: &str) -> OptimistResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a file, choosing the format by extension (`.json`, else TOML)
    pub fn load(path: impl AsRef<Path>) -> OptimistResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }
}

impl OptimisticConfig {
    /// Load a file over the defaults and validate the result
    pub fn from_file(path: impl AsRef<Path>) -> OptimistResult<Self> {
        let file = ConfigFile::load(path)?;
        let config = file.optimistic.merge_into(Self::default());
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML over the defaults and validate the result
    pub fn from_toml_str(content: &str) -> OptimistResult<Self> {
        let file = ConfigFile::from_toml_str(content)?;
        let config = file.optimistic.merge_into(Self::default());
        config.validate()?;
        Ok(config)
    }
}
