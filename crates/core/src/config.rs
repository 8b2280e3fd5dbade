//! Engine settings
//!
//! Loaded from TOML; every key is optional:
//!
//! ```toml
//! debounce_ms = 300
//! drain_pause_ms = 100
//!
//! [recovery]
//! max_attempts = 10        # 0 = retry forever
//! initial_backoff_ms = 100
//! max_backoff_ms = 30000
//! ```

use crate::error::TriggerError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MAX_DEBOUNCE_MS: u64 = 60_000;
const MAX_DRAIN_PAUSE_MS: u64 = 10_000;

/// Tunables of a trigger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerSettings {
    /// Pause between detecting a change and calling back (default: 300ms)
    pub debounce_ms: u64,

    /// Pause between cancelling and releasing watches during recovery (default: 100ms)
    pub drain_pause_ms: u64,

    /// Rebuild policy after a watch failure
    pub recovery: RecoverySettings,
}

/// Retry policy for rebuilding watches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoverySettings {
    /// Rebuild attempts per failure, 0 for unbounded (default: 10)
    pub max_attempts: u32,

    /// Delay after the first failed rebuild (default: 100ms)
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling delay (default: 30s)
    pub max_backoff_ms: u64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            drain_pause_ms: 100,
            recovery: RecoverySettings::default(),
        }
    }
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
        }
    }
}

impl TriggerSettings {
    /// Parse and validate settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| TriggerError::Settings {
            path: None,
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TriggerError::Settings {
            path: Some(path.to_path_buf()),
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            TriggerError::Settings { reason, .. } => TriggerError::Settings {
                path: Some(path.to_path_buf()),
                reason: format!("{}: {}", path.display(), reason),
            },
            other => other,
        })
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| TriggerError::Settings { path: None, reason };

        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(invalid(format!(
                "debounce_ms must be at most {} (got {})",
                MAX_DEBOUNCE_MS, self.debounce_ms
            )));
        }
        if self.drain_pause_ms > MAX_DRAIN_PAUSE_MS {
            return Err(invalid(format!(
                "drain_pause_ms must be at most {} (got {})",
                MAX_DRAIN_PAUSE_MS, self.drain_pause_ms
            )));
        }
        if self.recovery.initial_backoff_ms == 0 {
            return Err(invalid("recovery.initial_backoff_ms must be at least 1".to_string()));
        }
        if self.recovery.initial_backoff_ms > self.recovery.max_backoff_ms {
            return Err(invalid(format!(
                "recovery.initial_backoff_ms ({}) exceeds recovery.max_backoff_ms ({})",
                self.recovery.initial_backoff_ms, self.recovery.max_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn drain_pause(&self) -> Duration {
        Duration::from_millis(self.drain_pause_ms)
    }
}
