//! Advisory engine loadouts
//!
//! A loadout bundles model choice, system prompt, sampling temperature,
//! token cap and enabled capability tags. Records are stored by the bridge;
//! this module only validates them and holds the session's active one.

use crate::error::{DeckError, DeckResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Named preset for the advisory engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loadout {
    /// Unique name
    pub name: String,
    /// Model identifier
    pub model: String,
    /// System prompt
    pub system_prompt: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Response token cap
    pub max_tokens: u32,
    /// Enabled capability tags
    #[serde(default)]
    pub tools_enabled: Vec<String>,
}

impl Loadout {
    /// Create loadout with default sampling settings
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: String::new(),
            temperature: 0.7,
            max_tokens: 2048,
            tools_enabled: Vec::new(),
        }
    }

    /// With system prompt
    #[inline]
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// With token cap
    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// With capability tags
    #[inline]
    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools_enabled = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Check field ranges
    ///
    /// # Errors
    /// - `DeckError::InvalidLoadout` on empty name, temperature outside
    ///   `[0, 2]`, or a zero token cap
    pub fn validate(&self) -> DeckResult<()> {
        if self.name.trim().is_empty() {
            return Err(DeckError::InvalidLoadout("name must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DeckError::InvalidLoadout(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(DeckError::InvalidLoadout("max_tokens must be positive".to_string()));
        }
        Ok(())
    }

    /// Decode the bridge's structured config
    ///
    /// # Errors
    /// - `DeckError::InvalidLoadout` if decoding or validation fails
    pub fn from_value(value: serde_json::Value) -> DeckResult<Self> {
        let loadout: Self = serde_json::from_value(value)
            .map_err(|e| DeckError::InvalidLoadout(e.to_string()))?;
        loadout.validate()?;
        Ok(loadout)
    }

    /// Encode for the bridge
    ///
    /// # Errors
    /// - `DeckError::InvalidLoadout` if encoding fails
    pub fn to_value(&self) -> DeckResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| DeckError::InvalidLoadout(e.to_string()))
    }
}

/// The session's active loadout, swapped whole
#[derive(Debug)]
pub struct ActiveLoadout {
    current: RwLock<Arc<Loadout>>,
}

impl ActiveLoadout {
    /// Start with `initial` active
    #[must_use]
    pub fn new(initial: Loadout) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Current loadout
    #[inline]
    #[must_use]
    pub fn get(&self) -> Arc<Loadout> {
        Arc::clone(&self.current.read())
    }

    /// Replace the active loadout, returning the previous one
    pub fn swap(&self, next: Loadout) -> Arc<Loadout> {
        std::mem::replace(&mut *self.current.write(), Arc::new(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn validation_ranges() {
        assert!(Loadout::new("DEFAULT", "m").validate().is_ok());
        assert!(Loadout::new("", "m").validate().is_err());
        assert!(Loadout::new("x", "m").with_temperature(2.5).validate().is_err());
        assert!(Loadout::new("x", "m").with_temperature(-0.1).validate().is_err());
        assert!(Loadout::new("x", "m").with_max_tokens(0).validate().is_err());
    }

    #[test]
    fn value_roundtrip_keeps_tools() {
        let loadout = Loadout::new("ricer", "model-a")
            .with_system_prompt("You tune desktops.")
            .with_tools(["rice", "cron"]);
        let back = Loadout::from_value(loadout.to_value().unwrap()).unwrap();
        assert_eq!(back, loadout);
    }

    #[test]
    fn missing_tools_default_to_empty() {
        let value = serde_json::json!({
            "name": "bare",
            "model": "m",
            "system_prompt": "",
            "temperature": 0.2,
            "max_tokens": 100
        });
        let loadout = Loadout::from_value(value).unwrap();
        assert!(loadout.tools_enabled.is_empty());
    }

    #[test]
    fn swap_is_whole() {
        let active = ActiveLoadout::new(Loadout::new("DEFAULT", "m"));
        let held = active.get();
        let previous = active.swap(Loadout::new("ricer", "m2"));

        assert_eq!(previous.name, "DEFAULT");
        assert_eq!(held.name, "DEFAULT");
        assert_eq!(active.get().name, "ricer");
    }
}
