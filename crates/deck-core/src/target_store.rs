//! Configuration target buffers
//!
//! One [`ConfigTarget`] per loaded component, holding the last known-applied
//! baseline and the user's working buffer. Dirtiness is always derived from
//! the two contents, never stored.

use crate::bridge::CommandBridge;
use crate::error::{DeckError, DeckResult, NotFoundKind};
use crate::events::{DeckEvent, EventBus};
use dashmap::DashSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A named, mutable configuration surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTarget {
    /// Component identifier (e.g. `waybar`)
    pub component_id: String,
    /// Last known-applied content
    pub original_content: String,
    /// Working buffer
    pub pending_content: String,
}

impl ConfigTarget {
    /// Fresh target whose buffers both equal `content`
    #[must_use]
    pub fn new(component_id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            component_id: component_id.into(),
            original_content: content.clone(),
            pending_content: content,
        }
    }

    /// Check if the working buffer differs from the baseline
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.pending_content != self.original_content
    }
}

/// Result of asking to switch the active target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSwitch {
    /// Active target changed; any previous buffer was discarded
    Switched {
        /// Previously active component
        previous: Option<String>,
    },
    /// The requested component was already active; nothing changed
    Unchanged,
    /// The current target has unapplied edits; re-invoke with confirmation
    NeedsConfirmation {
        /// Component whose edits would be discarded
        current: String,
    },
}

#[derive(Debug, Default)]
struct StoreState {
    targets: HashMap<String, ConfigTarget>,
    active: Option<String>,
}

/// Marks a target as having an apply sequence in flight until dropped
///
/// While held, the target's buffers cannot be reloaded or discarded.
pub(crate) struct ApplyGuard<'a> {
    set: &'a DashSet<String>,
    target: String,
}

impl<'a> ApplyGuard<'a> {
    fn acquire(set: &'a DashSet<String>, target: &str) -> DeckResult<Self> {
        if set.insert(target.to_string()) {
            Ok(Self {
                set,
                target: target.to_string(),
            })
        } else {
            Err(DeckError::ApplyInProgress(target.to_string()))
        }
    }
}

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.target);
    }
}

/// Per-component configuration buffers with dirty tracking
pub struct ConfigTargetStore {
    bridge: Arc<dyn CommandBridge>,
    state: Mutex<StoreState>,
    in_flight: DashSet<String>,
    events: EventBus,
}

impl std::fmt::Debug for ConfigTargetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigTargetStore")
            .field("state", &self.state)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl ConfigTargetStore {
    /// Create an empty store reading live content through `bridge`
    #[must_use]
    pub fn new(bridge: Arc<dyn CommandBridge>, events: EventBus) -> Self {
        Self {
            bridge,
            state: Mutex::new(StoreState::default()),
            in_flight: DashSet::new(),
            events,
        }
    }

    /// Claim `component` for an apply sequence
    ///
    /// # Errors
    /// - `DeckError::ApplyInProgress` if another sequence holds it
    pub(crate) fn begin_apply(&self, component: &str) -> DeckResult<ApplyGuard<'_>> {
        ApplyGuard::acquire(&self.in_flight, component)
    }

    /// Check if an apply sequence holds `component`
    #[inline]
    #[must_use]
    pub fn is_applying(&self, component: &str) -> bool {
        self.in_flight.contains(component)
    }

    /// Fetch live content and reset both buffers to it
    ///
    /// Any unapplied edit for the component is discarded.
    ///
    /// # Errors
    /// - `DeckError::ApplyInProgress` if an apply sequence holds the component
    /// - `DeckError::BridgeUnavailable` if the bridge read fails; buffers unchanged
    pub async fn load(&self, component: &str) -> DeckResult<String> {
        if self.is_applying(component) {
            return Err(DeckError::ApplyInProgress(component.to_string()));
        }
        self.load_held(component).await
    }

    /// [`Self::load`] for a caller that already holds the component's guard
    pub(crate) async fn load_held(&self, component: &str) -> DeckResult<String> {
        let content = self.bridge.get_rice_config(component).await.map_err(|err| {
            tracing::error!(component = component, error = %err, "failed to load config");
            DeckError::BridgeUnavailable(err)
        })?;

        let was_dirty = {
            let mut state = self.state.lock();
            let was_dirty = state
                .targets
                .get(component)
                .is_some_and(ConfigTarget::is_dirty);
            state
                .targets
                .insert(component.to_string(), ConfigTarget::new(component, content.clone()));
            was_dirty
        };

        tracing::info!(component = component, bytes = content.len(), "config loaded");
        if was_dirty {
            self.publish_dirty(component, false);
        }
        Ok(content)
    }

    /// Replace the working buffer; returns the new dirty flag
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component was never loaded
    pub fn edit(&self, component: &str, new_content: impl Into<String>) -> DeckResult<bool> {
        let (was, now) = {
            let mut state = self.state.lock();
            let target = state
                .targets
                .get_mut(component)
                .ok_or_else(|| DeckError::not_found(NotFoundKind::Target, component))?;
            let was = target.is_dirty();
            target.pending_content = new_content.into();
            (was, target.is_dirty())
        };

        if was != now {
            self.publish_dirty(component, now);
        }
        Ok(now)
    }

    /// Check if a component has unapplied edits; unknown components are clean
    #[must_use]
    pub fn is_dirty(&self, component: &str) -> bool {
        self.state
            .lock()
            .targets
            .get(component)
            .is_some_and(ConfigTarget::is_dirty)
    }

    /// Record a successful apply: baseline and buffer both become `applied`
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component was never loaded
    pub fn commit(&self, component: &str, applied: impl Into<String>) -> DeckResult<()> {
        let was_dirty = {
            let mut state = self.state.lock();
            let target = state
                .targets
                .get_mut(component)
                .ok_or_else(|| DeckError::not_found(NotFoundKind::Target, component))?;
            let was_dirty = target.is_dirty();
            let applied = applied.into();
            target.original_content = applied.clone();
            target.pending_content = applied;
            was_dirty
        };

        if was_dirty {
            self.publish_dirty(component, false);
        }
        Ok(())
    }

    /// Throw away unapplied edits, keeping the baseline
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component was never loaded
    pub fn revert(&self, component: &str) -> DeckResult<()> {
        let was_dirty = {
            let mut state = self.state.lock();
            let target = state
                .targets
                .get_mut(component)
                .ok_or_else(|| DeckError::not_found(NotFoundKind::Target, component))?;
            let was_dirty = target.is_dirty();
            target.pending_content = target.original_content.clone();
            was_dirty
        };

        if was_dirty {
            self.publish_dirty(component, false);
        }
        Ok(())
    }

    /// Copy of a component's buffers
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component was never loaded
    pub fn get(&self, component: &str) -> DeckResult<ConfigTarget> {
        self.state
            .lock()
            .targets
            .get(component)
            .cloned()
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Target, component))
    }

    /// Make `component` the active editor target
    ///
    /// If the current target is dirty and `confirm_discard` is false, nothing
    /// changes and a confirmation decision is returned instead. On switch the
    /// previous target's buffers are dropped.
    ///
    /// # Errors
    /// - `DeckError::ApplyInProgress` if the current target has an apply in
    ///   flight; its buffers are needed to record the outcome
    pub fn select(&self, component: &str, confirm_discard: bool) -> DeckResult<TargetSwitch> {
        let mut state = self.state.lock();

        if state.active.as_deref() == Some(component) {
            return Ok(TargetSwitch::Unchanged);
        }

        if let Some(current) = state.active.as_deref() {
            if self.is_applying(current) {
                tracing::debug!(current, requested = component, "switch blocked by apply");
                return Err(DeckError::ApplyInProgress(current.to_string()));
            }
        }

        let current_dirty = state
            .active
            .as_ref()
            .and_then(|active| state.targets.get(active))
            .is_some_and(ConfigTarget::is_dirty);

        if current_dirty && !confirm_discard {
            let current = state.active.clone().unwrap_or_default();
            tracing::debug!(current = %current, requested = component, "switch needs confirmation");
            return Ok(TargetSwitch::NeedsConfirmation { current });
        }

        let previous = state.active.replace(component.to_string());
        if let Some(prev) = &previous {
            state.targets.remove(prev);
        }
        drop(state);

        if current_dirty {
            if let Some(prev) = &previous {
                tracing::info!(component = %prev, "discarded unapplied edits");
                self.publish_dirty(prev, false);
            }
        }
        Ok(TargetSwitch::Switched { previous })
    }

    /// Currently active component
    #[must_use]
    pub fn active(&self) -> Option<String> {
        self.state.lock().active.clone()
    }

    /// Every loaded component with unapplied edits
    #[must_use]
    pub fn dirty_targets(&self) -> Vec<String> {
        let mut dirty: Vec<String> = self
            .state
            .lock()
            .targets
            .values()
            .filter(|t| t.is_dirty())
            .map(|t| t.component_id.clone())
            .collect();
        dirty.sort();
        dirty
    }

    fn publish_dirty(&self, component: &str, dirty: bool) {
        self.events.publish(DeckEvent::TargetDirtyChanged {
            target: component.to_string(),
            dirty,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_is_derived() {
        let mut target = ConfigTarget::new("waybar", "A");
        assert!(!target.is_dirty());

        target.pending_content = "B".to_string();
        assert!(target.is_dirty());

        target.pending_content = "A".to_string();
        assert!(!target.is_dirty());
    }

    #[test]
    fn apply_guard_is_exclusive_per_target() {
        let set = DashSet::new();

        let guard = ApplyGuard::acquire(&set, "waybar").unwrap();
        assert!(matches!(
            ApplyGuard::acquire(&set, "waybar"),
            Err(DeckError::ApplyInProgress(_))
        ));
        let other = ApplyGuard::acquire(&set, "polybar").unwrap();

        drop(guard);
        assert!(ApplyGuard::acquire(&set, "waybar").is_ok());
        drop(other);
        assert!(set.is_empty());
    }
}
