//! Safe-apply coordinator
//!
//! The protocol every configuration write goes through:
//!
//! 1. **Guard**: at most one apply sequence per target; a second request
//!    fails with `ApplyInProgress` instead of queuing.
//! 2. **Precondition**: the target must be dirty, else `NothingToApply`.
//! 3. **Backup**: create a snapshot named `{prefix}{target}-{millis}`. If that
//!    fails the sequence aborts with `BackupFailed` and the write is never
//!    issued.
//! 4. **Apply**: send the pending content. Success commits the target and
//!    completes the operation; failure keeps the edits and fails the
//!    operation with the upstream reason.
//! 5. **Reload** (separate, user-gated): run the component's reload command.
//!    Reload failure never reverts a committed apply.
//!
//! Preview is read-only and takes no lock; it may be stale by apply time.

use crate::bridge::CommandBridge;
use crate::error::{DeckError, DeckResult};
use crate::events::{ApplyOutcome, DeckEvent, EventBus};
use crate::presets::PresetCatalog;
use crate::registry::OperationRegistry;
use crate::target_store::ConfigTargetStore;
use crate::types::{OperationId, OperationState, Snapshot};
use chrono::Utc;
use similar::{ChangeTag, TextDiff};
use std::sync::Arc;

/// Read-only comparison of a target's pending buffer against its baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPreview {
    /// Component id
    pub target: String,
    /// Whether there is anything to apply
    pub dirty: bool,
    /// Lines present only in the pending buffer
    pub lines_added: usize,
    /// Lines present only in the baseline
    pub lines_removed: usize,
    /// Unified diff of baseline vs pending
    pub unified_diff: String,
    /// Preview text produced by the bridge, `None` if the bridge could not
    /// render one
    pub bridge_preview: Option<String>,
}

/// Result of a successful apply sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Component id
    pub target: String,
    /// Restore point taken before the write
    pub snapshot: Snapshot,
    /// Operation completed by this apply, if operation-driven
    pub operation: Option<OperationId>,
    /// Whether a reload action is available for the component
    pub reload_available: bool,
}

/// Result of a reload action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    /// Component id
    pub target: String,
    /// Command that was run
    pub command: String,
    /// Whether the command reported success
    pub success: bool,
    /// Stdout on success, stderr otherwise
    pub detail: String,
}

/// Orchestrates preview, backup, apply, reload and restore per target
pub struct SafeApplyCoordinator {
    bridge: Arc<dyn CommandBridge>,
    store: Arc<ConfigTargetStore>,
    registry: Arc<OperationRegistry>,
    presets: PresetCatalog,
    events: EventBus,
    snapshot_prefix: String,
}

impl std::fmt::Debug for SafeApplyCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeApplyCoordinator")
            .field("store", &self.store)
            .field("snapshot_prefix", &self.snapshot_prefix)
            .finish_non_exhaustive()
    }
}

impl SafeApplyCoordinator {
    /// Create coordinator over shared store and registry
    #[must_use]
    pub fn new(
        bridge: Arc<dyn CommandBridge>,
        store: Arc<ConfigTargetStore>,
        registry: Arc<OperationRegistry>,
        events: EventBus,
    ) -> Self {
        Self {
            bridge,
            store,
            registry,
            presets: PresetCatalog::new(),
            events,
            snapshot_prefix: String::new(),
        }
    }

    /// With snapshot name prefix
    #[inline]
    #[must_use]
    pub fn with_snapshot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.snapshot_prefix = prefix.into();
        self
    }

    /// Check if an apply sequence is running for `target`
    #[inline]
    #[must_use]
    pub fn is_applying(&self, target: &str) -> bool {
        self.store.is_applying(target)
    }

    /// Compare pending vs baseline without mutating anything
    ///
    /// A failing bridge preview is logged and leaves `bridge_preview` empty;
    /// the local diff is still returned.
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the target was never loaded
    pub async fn preview(&self, target: &str) -> DeckResult<TargetPreview> {
        let buffers = self.store.get(target)?;
        let bridge_preview = match self
            .bridge
            .preview_rice_config(target, &buffers.pending_content)
            .await
        {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(component = target, error = %err, "bridge preview unavailable");
                None
            }
        };

        let diff = TextDiff::from_lines(&buffers.original_content, &buffers.pending_content);
        let (mut lines_added, mut lines_removed) = (0, 0);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => lines_added += 1,
                ChangeTag::Delete => lines_removed += 1,
                ChangeTag::Equal => {}
            }
        }
        let unified_diff = diff
            .unified_diff()
            .context_radius(3)
            .header("deployed", "pending")
            .to_string();

        tracing::debug!(component = target, lines_added, lines_removed, "previewed target");
        Ok(TargetPreview {
            target: target.to_string(),
            dirty: buffers.is_dirty(),
            lines_added,
            lines_removed,
            unified_diff,
            bridge_preview,
        })
    }

    /// Run the backup-then-apply sequence for a dirty target
    ///
    /// When `operation` is given it must be PENDING; it moves to APPLYING once
    /// the preconditions hold, and to COMPLETED or FAILED with the outcome.
    ///
    /// # Errors
    /// - `DeckError::ApplyInProgress` if another sequence holds the target
    /// - `DeckError::NotFound` if the target was never loaded or the
    ///   operation is unknown
    /// - `DeckError::NothingToApply` if the target is clean
    /// - `DeckError::InvalidTransition` if the operation is not PENDING
    /// - `DeckError::BackupFailed` if the snapshot could not be created
    /// - `DeckError::ApplyFailed` if the bridge rejected the write
    pub async fn apply(
        &self,
        target: &str,
        operation: Option<OperationId>,
    ) -> DeckResult<ApplyReport> {
        let _guard = self.store.begin_apply(target)?;

        let buffers = self.store.get(target)?;
        if !buffers.is_dirty() {
            return Err(DeckError::NothingToApply(target.to_string()));
        }
        if let Some(id) = operation {
            self.registry.transition_to(id, OperationState::Applying)?;
        }
        let content = buffers.pending_content;

        let snapshot = Snapshot::for_target(&self.snapshot_prefix, target, Utc::now());
        if let Err(reason) = self.bridge.create_snapshot(&snapshot.name).await {
            tracing::error!(
                component = target,
                snapshot = %snapshot.name,
                error = %reason,
                "backup failed, apply aborted"
            );
            self.finish_operation(operation, Some(reason.as_str()));
            self.events.publish(DeckEvent::ApplyFinished {
                target: target.to_string(),
                snapshot: None,
                outcome: ApplyOutcome::BackupFailed(reason.to_string()),
                reload_available: false,
            });
            return Err(DeckError::BackupFailed {
                target: target.to_string(),
                snapshot: snapshot.name,
                reason,
            });
        }

        tracing::info!(component = target, snapshot = %snapshot.name, "snapshot created");
        self.events.publish(DeckEvent::SnapshotCreated {
            target: target.to_string(),
            snapshot: snapshot.name.clone(),
        });

        if let Err(reason) = self.bridge.apply_rice_config(target, &content).await {
            tracing::error!(component = target, error = %reason, "apply failed, edits kept");
            self.finish_operation(operation, Some(reason.as_str()));
            self.events.publish(DeckEvent::ApplyFinished {
                target: target.to_string(),
                snapshot: Some(snapshot.name.clone()),
                outcome: ApplyOutcome::Failed(reason.to_string()),
                reload_available: false,
            });
            return Err(DeckError::ApplyFailed {
                target: target.to_string(),
                reason,
            });
        }

        // The live config is written; record success even if the buffers are gone.
        if let Err(err) = self.store.commit(target, content) {
            tracing::warn!(
                component = target,
                error = %err,
                "applied target has no buffers to commit"
            );
        }
        self.finish_operation(operation, None);

        let reload_available = self.presets.has_reload(target);
        tracing::info!(component = target, snapshot = %snapshot.name, "config applied");
        self.events.publish(DeckEvent::ApplyFinished {
            target: target.to_string(),
            snapshot: Some(snapshot.name.clone()),
            outcome: ApplyOutcome::Applied,
            reload_available,
        });

        Ok(ApplyReport {
            target: target.to_string(),
            snapshot,
            operation,
            reload_available,
        })
    }

    /// Run the component's reload command
    ///
    /// Does not touch target buffers or operation state; a failing command
    /// is reported in the returned [`ReloadReport`].
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component has no reload command
    /// - `DeckError::BridgeUnavailable` if the command could not be run
    pub async fn reload(&self, target: &str) -> DeckResult<ReloadReport> {
        let command = self.presets.reload_command(target)?;
        let output = self.bridge.run_command(command).await?;

        let detail = if output.success {
            output.stdout
        } else {
            tracing::warn!(component = target, stderr = %output.stderr, "reload reported failure");
            output.stderr
        };
        self.events.publish(DeckEvent::ReloadFinished {
            target: target.to_string(),
            success: output.success,
            detail: detail.clone(),
        });

        Ok(ReloadReport {
            target: target.to_string(),
            command: command.to_string(),
            success: output.success,
            detail,
        })
    }

    /// Restore a snapshot, then re-read `target` so its baseline matches
    ///
    /// # Errors
    /// - `DeckError::ApplyInProgress` if `target` has a sequence in flight
    /// - `DeckError::BridgeUnavailable` if restore or reload of content fails
    pub async fn restore(&self, snapshot: &str, target: Option<&str>) -> DeckResult<()> {
        let _guard = target
            .map(|t| self.store.begin_apply(t))
            .transpose()?;

        self.bridge.restore_snapshot(snapshot).await?;
        tracing::info!(snapshot, "snapshot restored");

        if let Some(target) = target {
            self.store.load_held(target).await?;
        }
        Ok(())
    }

    fn finish_operation(&self, operation: Option<OperationId>, failure: Option<&str>) {
        let Some(id) = operation else {
            return;
        };
        let result = match failure {
            Some(reason) => self.registry.fail(id, reason),
            None => self.registry.transition_to(id, OperationState::Completed),
        };
        if let Err(err) = result {
            tracing::warn!(operation = %id, error = %err, "could not record apply outcome");
        }
    }
}
