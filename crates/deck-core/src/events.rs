//! Outbound notification feed
//!
//! The presentation layer subscribes to [`EventBus`] and renders whatever it
//! receives; the core never calls into the UI.

use crate::types::{OperationId, OperationState};
use tokio::sync::broadcast;

/// Outcome of an apply sequence, as reported on the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Content written and committed
    Applied,
    /// Aborted before the write because the backup failed
    BackupFailed(String),
    /// The bridge rejected the write
    Failed(String),
}

/// Notifications published by the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckEvent {
    /// New PENDING operation
    OperationCreated {
        /// Operation id
        id: OperationId,
        /// Kind tag
        kind: String,
        /// Label
        label: String,
    },
    /// Operation moved along a state edge
    OperationTransitioned {
        /// Operation id
        id: OperationId,
        /// Previous state
        from: OperationState,
        /// New state
        to: OperationState,
    },
    /// Operation cancelled and dropped from the active set
    OperationCancelled {
        /// Operation id
        id: OperationId,
    },
    /// Terminal operation dropped after its grace interval
    OperationRemoved {
        /// Operation id
        id: OperationId,
    },
    /// Dirty flag of a target flipped
    TargetDirtyChanged {
        /// Component id
        target: String,
        /// New dirty flag
        dirty: bool,
    },
    /// Backup point recorded before an apply
    SnapshotCreated {
        /// Component id
        target: String,
        /// Snapshot name
        snapshot: String,
    },
    /// Apply sequence finished
    ApplyFinished {
        /// Component id
        target: String,
        /// Snapshot taken, if the backup step succeeded
        snapshot: Option<String>,
        /// Result
        outcome: ApplyOutcome,
        /// Whether a reload command exists for the component
        reload_available: bool,
    },
    /// Reload action finished
    ReloadFinished {
        /// Component id
        target: String,
        /// Whether the reload command succeeded
        success: bool,
        /// Stdout or stderr of the reload
        detail: String,
    },
    /// Active loadout swapped
    LoadoutActivated {
        /// Loadout name
        name: String,
    },
}

/// Broadcast channel carrying [`DeckEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeckEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per slow subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all events published from now on
    #[inline]
    pub fn subscribe(&self) -> broadcast::Receiver<DeckEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is fine
    #[inline]
    pub fn publish(&self, event: DeckEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
