//! Session configuration

use crate::error::{DeckError, DeckResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// NixDeck session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeckConfig {
    /// Seconds a COMPLETED/FAILED operation stays listed before cleanup
    pub completed_grace_secs: u64,
    /// Events buffered per slow subscriber
    pub event_capacity: usize,
    /// Loadout name used for advisory messages until another is activated
    pub default_loadout: String,
    /// Prefix prepended to every snapshot name
    pub snapshot_prefix: String,
}

impl DeckConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With grace interval
    #[inline]
    #[must_use]
    pub fn with_completed_grace(mut self, grace: Duration) -> Self {
        self.completed_grace_secs = grace.as_secs();
        self
    }

    /// With event capacity
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// With default loadout name
    #[inline]
    #[must_use]
    pub fn with_default_loadout(mut self, name: impl Into<String>) -> Self {
        self.default_loadout = name.into();
        self
    }

    /// With snapshot prefix
    #[inline]
    #[must_use]
    pub fn with_snapshot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.snapshot_prefix = prefix.into();
        self
    }

    /// Grace interval as a duration
    #[inline]
    #[must_use]
    pub fn completed_grace(&self) -> Duration {
        Duration::from_secs(self.completed_grace_secs)
    }

    /// Parse and validate TOML; missing keys take defaults
    ///
    /// # Errors
    /// - `DeckError::Config` on syntax errors, unknown keys or invalid values
    pub fn from_toml_str(input: &str) -> DeckResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| DeckError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// - `DeckError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> DeckResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| DeckError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// - `DeckError::Config` if serialization fails
    pub fn to_toml_string(&self) -> DeckResult<String> {
        toml::to_string_pretty(self).map_err(|e| DeckError::Config(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `DeckError::Config` if `event_capacity` is zero or the default
    ///   loadout name is empty
    pub fn validate(&self) -> DeckResult<()> {
        if self.event_capacity == 0 {
            return Err(DeckError::Config("event_capacity must be positive".to_string()));
        }
        if self.default_loadout.trim().is_empty() {
            return Err(DeckError::Config("default_loadout must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            completed_grace_secs: 3,
            event_capacity: 64,
            default_loadout: "DEFAULT".to_string(),
            snapshot_prefix: String::new(),
        }
    }
}
