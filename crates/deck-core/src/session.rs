//! Session context
//!
//! One [`DeckSession`] owns the registry, target store, coordinator, loadout
//! state and event feed for a user session. Nothing here is global; tests
//! build as many independent sessions as they like.

use crate::bridge::CommandBridge;
use crate::config::DeckConfig;
use crate::coordinator::{ApplyReport, ReloadReport, SafeApplyCoordinator, TargetPreview};
use crate::error::{DeckError, DeckResult};
use crate::events::{DeckEvent, EventBus};
use crate::executor::{BridgeOperationExecutor, OperationExecutor, OperationKind};
use crate::loadout::{ActiveLoadout, Loadout};
use crate::presets::PresetCatalog;
use crate::registry::OperationRegistry;
use crate::target_store::{ConfigTarget, ConfigTargetStore, TargetSwitch};
use crate::types::{Operation, OperationId, OperationPreview, OperationState};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(100);

/// Advisory reply plus the operations proposed in it
#[derive(Debug, Clone)]
pub struct Advice {
    /// Reply text, verbatim
    pub text: String,
    /// PENDING operations created from markers in the reply
    pub operations: Vec<Operation>,
}

/// Per-session owner of all mutable NixDeck state
pub struct DeckSession {
    config: DeckConfig,
    bridge: Arc<dyn CommandBridge>,
    events: EventBus,
    registry: Arc<OperationRegistry>,
    store: Arc<ConfigTargetStore>,
    coordinator: SafeApplyCoordinator,
    executor: Arc<dyn OperationExecutor>,
    presets: PresetCatalog,
    loadout: ActiveLoadout,
}

impl std::fmt::Debug for DeckSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckSession")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("store", &self.store)
            .field("loadout", &self.loadout)
            .finish_non_exhaustive()
    }
}

impl DeckSession {
    /// Create a session over `bridge`
    ///
    /// # Errors
    /// - `DeckError::Config` if `config` fails validation
    pub fn new(bridge: Arc<dyn CommandBridge>, config: DeckConfig) -> DeckResult<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_capacity);
        let registry = Arc::new(OperationRegistry::new(
            config.completed_grace(),
            events.clone(),
        ));
        let store = Arc::new(ConfigTargetStore::new(Arc::clone(&bridge), events.clone()));
        let coordinator = SafeApplyCoordinator::new(
            Arc::clone(&bridge),
            Arc::clone(&store),
            Arc::clone(&registry),
            events.clone(),
        )
        .with_snapshot_prefix(config.snapshot_prefix.clone());
        let executor = Arc::new(BridgeOperationExecutor::new(Arc::clone(&bridge)));
        let loadout = ActiveLoadout::new(Loadout::new(config.default_loadout.clone(), ""));

        tracing::info!(loadout = %config.default_loadout, "session started");
        Ok(Self {
            config,
            bridge,
            events,
            registry,
            store,
            coordinator,
            executor,
            presets: PresetCatalog::new(),
            loadout,
        })
    }

    /// Replace the executor used for non-config operations
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn OperationExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    /// Preset lookups
    #[inline]
    #[must_use]
    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    /// Subscribe to the notification feed
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeckEvent> {
        self.events.subscribe()
    }

    // ---- operations ----

    /// Send `message` to the advisory engine and propose any marked actions
    ///
    /// # Errors
    /// - `DeckError::InvalidOperation` if `message` is blank
    /// - `DeckError::BridgeUnavailable` if the advisory call fails
    pub async fn advise(&self, message: &str) -> DeckResult<Advice> {
        if message.trim().is_empty() {
            return Err(DeckError::InvalidOperation(
                "message must not be empty".to_string(),
            ));
        }

        let loadout = self.loadout.get();
        let text = self
            .bridge
            .send_advisory_message(message, &loadout.name)
            .await?;
        let operations = self.registry.create_from_text(&text);

        tracing::info!(
            loadout = %loadout.name,
            proposed = operations.len(),
            "advisory reply received"
        );
        Ok(Advice { text, operations })
    }

    /// Propose operations from text already in hand
    pub fn ingest(&self, text: &str) -> Vec<Operation> {
        self.registry.create_from_text(text)
    }

    /// Read-only preview of an operation
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent
    pub fn preview_operation(&self, id: OperationId) -> DeckResult<OperationPreview> {
        self.registry.preview(id)
    }

    /// Carry out a PENDING operation; returns it in its terminal state
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent
    /// - `DeckError::InvalidTransition` if not PENDING
    /// - Any execution error, after the operation was marked FAILED
    pub async fn apply_operation(&self, id: OperationId) -> DeckResult<Operation> {
        let operation = self.registry.get(id)?;
        if !operation.is_pending() {
            return Err(DeckError::InvalidTransition {
                id,
                from: operation.state,
                to: OperationState::Applying,
            });
        }

        if OperationKind::parse(&operation.kind) == OperationKind::Config {
            self.coordinator.apply(&operation.label, Some(id)).await?;
            return self.registry.get(id);
        }

        let operation = self.registry.transition_to(id, OperationState::Applying)?;
        match self.executor.execute(&operation).await {
            Ok(()) => self.registry.transition_to(id, OperationState::Completed),
            Err(err) => {
                let reason = err
                    .upstream_reason()
                    .map_or_else(|| err.to_string(), str::to_string);
                self.registry.fail(id, reason)?;
                Err(err)
            }
        }
    }

    /// Cancel a PENDING operation
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent or already cancelled
    /// - `DeckError::InvalidTransition` if not PENDING
    pub fn cancel_operation(&self, id: OperationId) -> DeckResult<Operation> {
        self.registry.cancel(id)
    }

    /// Drop a COMPLETED or FAILED operation before its grace interval ends
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent
    /// - `DeckError::InvalidTransition` if the operation is not terminal
    pub fn dismiss_operation(&self, id: OperationId) -> DeckResult<Operation> {
        self.registry.dismiss(id)
    }

    /// Active operations in creation order
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.registry.list()
    }

    /// Drop terminal operations past their grace interval
    pub fn sweep(&self) -> Vec<OperationId> {
        self.registry.sweep_expired(Instant::now())
    }

    /// Periodically sweep until the session is dropped
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self.registry.grace().max(MIN_SWEEP_PERIOD);
        let session: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.sweep();
            }
        })
    }

    // ---- configuration targets ----

    /// Make `component` the editor's target, asking first if edits would be lost
    ///
    /// # Errors
    /// - `DeckError::ApplyInProgress` if the current target is being applied
    pub fn select_target(
        &self,
        component: &str,
        confirm_discard: bool,
    ) -> DeckResult<TargetSwitch> {
        self.store.select(component, confirm_discard)
    }

    /// Currently selected component
    #[must_use]
    pub fn active_target(&self) -> Option<String> {
        self.store.active()
    }

    /// Read live content into both buffers
    ///
    /// # Errors
    /// - `DeckError::ApplyInProgress` if the component is being applied
    /// - `DeckError::BridgeUnavailable` if the read fails
    pub async fn load_target(&self, component: &str) -> DeckResult<String> {
        self.store.load(component).await
    }

    /// Replace a target's working buffer; returns the dirty flag
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component was never loaded
    pub fn edit_target(&self, component: &str, content: impl Into<String>) -> DeckResult<bool> {
        self.store.edit(component, content)
    }

    /// Discard a target's unapplied edits
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component was never loaded
    pub fn revert_target(&self, component: &str) -> DeckResult<()> {
        self.store.revert(component)
    }

    /// Copy of a target's buffers
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component was never loaded
    pub fn target(&self, component: &str) -> DeckResult<ConfigTarget> {
        self.store.get(component)
    }

    /// Check if a target has unapplied edits
    #[must_use]
    pub fn is_target_dirty(&self, component: &str) -> bool {
        self.store.is_dirty(component)
    }

    /// Diff a target's pending buffer against its baseline
    ///
    /// # Errors
    /// See [`SafeApplyCoordinator::preview`]
    pub async fn preview_target(&self, component: &str) -> DeckResult<TargetPreview> {
        self.coordinator.preview(component).await
    }

    /// Back up and apply a target's pending buffer
    ///
    /// # Errors
    /// See [`SafeApplyCoordinator::apply`]
    pub async fn apply_target(&self, component: &str) -> DeckResult<ApplyReport> {
        self.coordinator.apply(component, None).await
    }

    /// Run a component's reload command
    ///
    /// # Errors
    /// See [`SafeApplyCoordinator::reload`]
    pub async fn reload_target(&self, component: &str) -> DeckResult<ReloadReport> {
        self.coordinator.reload(component).await
    }

    // ---- snapshots ----

    /// Snapshot names known to the bridge
    ///
    /// # Errors
    /// - `DeckError::BridgeUnavailable` if the bridge call fails
    pub async fn list_snapshots(&self) -> DeckResult<Vec<String>> {
        Ok(self.bridge.list_snapshots().await?)
    }

    /// Restore a snapshot, re-reading `target` afterwards if given
    ///
    /// # Errors
    /// See [`SafeApplyCoordinator::restore`]
    pub async fn restore_snapshot(&self, name: &str, target: Option<&str>) -> DeckResult<()> {
        self.coordinator.restore(name, target).await
    }

    // ---- loadouts ----

    /// Loadout names known to the bridge
    ///
    /// # Errors
    /// - `DeckError::BridgeUnavailable` if the bridge call fails
    pub async fn list_loadouts(&self) -> DeckResult<Vec<String>> {
        Ok(self.bridge.list_loadouts().await?)
    }

    /// Fetch and decode a loadout
    ///
    /// # Errors
    /// - `DeckError::BridgeUnavailable` if the bridge call fails
    /// - `DeckError::InvalidLoadout` if the record does not decode
    pub async fn load_loadout(&self, name: &str) -> DeckResult<Loadout> {
        let value = self.bridge.load_loadout(name).await?;
        Loadout::from_value(value)
    }

    /// Validate and store a loadout, overwriting any with the same name
    ///
    /// # Errors
    /// - `DeckError::InvalidLoadout` on validation failure
    /// - `DeckError::BridgeUnavailable` if the bridge call fails
    pub async fn save_loadout(&self, loadout: &Loadout) -> DeckResult<()> {
        loadout.validate()?;
        let value = loadout.to_value()?;
        self.bridge.save_loadout(&loadout.name, &value).await?;
        tracing::info!(loadout = %loadout.name, "loadout saved");
        Ok(())
    }

    /// Store a new loadout whose name is not taken yet
    ///
    /// # Errors
    /// - `DeckError::DuplicateLoadout` if the name exists
    /// - Same as [`Self::save_loadout`]
    pub async fn create_loadout(&self, loadout: &Loadout) -> DeckResult<()> {
        loadout.validate()?;
        let existing = self.list_loadouts().await?;
        if existing.iter().any(|name| name == &loadout.name) {
            return Err(DeckError::DuplicateLoadout(loadout.name.clone()));
        }
        self.save_loadout(loadout).await
    }

    /// Load a loadout and make it the one advisory messages use
    ///
    /// # Errors
    /// Same as [`Self::load_loadout`]
    pub async fn activate_loadout(&self, name: &str) -> DeckResult<Arc<Loadout>> {
        let loadout = self.load_loadout(name).await?;
        let previous = self.loadout.swap(loadout);

        tracing::info!(from = %previous.name, to = name, "loadout activated");
        self.events.publish(DeckEvent::LoadoutActivated {
            name: name.to_string(),
        });
        Ok(self.loadout.get())
    }

    /// Loadout currently used for advisory messages
    #[must_use]
    pub fn active_loadout(&self) -> Arc<Loadout> {
        self.loadout.get()
    }

    /// Cancel every PENDING operation; returns the ids cancelled
    pub fn shutdown(&self) -> Vec<OperationId> {
        let cancelled: Vec<OperationId> = self
            .registry
            .pending_ids()
            .into_iter()
            .filter(|id| self.registry.cancel(*id).is_ok())
            .collect();

        tracing::info!(cancelled = cancelled.len(), "session shut down");
        cancelled
    }
}
