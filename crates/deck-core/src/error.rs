//! Error types for NixDeck Core
//!
//! Every failure is scoped to a single operation or target:
//! - Registry errors (unknown ids, illegal state edges)
//! - Apply protocol errors (nothing dirty, backup failure, write failure)
//! - Concurrency guard trips
//! - Opaque command bridge failures

use crate::types::{OperationId, OperationState};

/// Main NixDeck error type
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// Requested state edge is not part of the operation state machine
    #[error("invalid transition for operation {id}: {from} -> {to}")]
    InvalidTransition {
        /// Operation being moved
        id: OperationId,
        /// Current state
        from: OperationState,
        /// Requested state
        to: OperationState,
    },

    /// Unknown operation, loadout, preset or target
    #[error("{0} not found: {1}")]
    NotFound(NotFoundKind, String),

    /// Apply requested while pending content equals the baseline
    #[error("nothing to apply for {0}")]
    NothingToApply(String),

    /// Snapshot creation failed; the live system was not touched
    #[error("backup {snapshot} for {target} failed: {reason}")]
    BackupFailed {
        /// Target whose apply was aborted
        target: String,
        /// Snapshot name that could not be created
        snapshot: String,
        /// Upstream reason, verbatim
        reason: BridgeError,
    },

    /// The bridge rejected the write; pending content is preserved
    #[error("apply to {target} failed: {reason}")]
    ApplyFailed {
        /// Target that stays dirty
        target: String,
        /// Upstream reason, verbatim
        reason: BridgeError,
    },

    /// Another apply sequence for the same target is still in flight
    #[error("apply already in progress for {0}")]
    ApplyInProgress(String),

    /// An underlying bridge call failed to complete
    #[error("command bridge unavailable: {0}")]
    BridgeUnavailable(#[from] BridgeError),

    /// Operation could not be created (e.g. empty source context)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A loadout with this name already exists
    #[error("loadout already exists: {0}")]
    DuplicateLoadout(String),

    /// Loadout record failed validation or could not be decoded
    #[error("invalid loadout: {0}")]
    InvalidLoadout(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl DeckError {
    /// Create a not-found error
    #[inline]
    pub fn not_found(kind: NotFoundKind, key: impl Into<String>) -> Self {
        Self::NotFound(kind, key.into())
    }

    /// Check if the caller may retry the same request later
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ApplyFailed { .. }
                | Self::ApplyInProgress(_)
                | Self::BridgeUnavailable(_)
                | Self::BackupFailed { .. }
        )
    }

    /// Check if this error guarantees no live mutation was attempted
    #[inline]
    #[must_use]
    pub fn system_untouched(&self) -> bool {
        matches!(
            self,
            Self::BackupFailed { .. } | Self::NothingToApply(_) | Self::ApplyInProgress(_)
        )
    }

    /// Upstream reason carried by bridge-originated failures
    #[must_use]
    pub fn upstream_reason(&self) -> Option<&str> {
        match self {
            Self::BackupFailed { reason, .. }
            | Self::ApplyFailed { reason, .. }
            | Self::BridgeUnavailable(reason) => Some(reason.as_str()),
            _ => None,
        }
    }
}

/// What kind of entity a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotFoundKind {
    /// Operation id
    Operation,
    /// Loadout name
    Loadout,
    /// Schedule preset, job or unit template
    Preset,
    /// Configuration target that was never loaded
    Target,
    /// Component without a reload command
    ReloadCommand,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Operation => "operation",
            Self::Loadout => "loadout",
            Self::Preset => "preset",
            Self::Target => "target",
            Self::ReloadCommand => "reload command",
        };
        f.write_str(name)
    }
}

/// Opaque failure reported by the command bridge
///
/// The text is kept verbatim so it can be shown to the user unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BridgeError(pub String);

impl BridgeError {
    /// Create bridge error from any displayable reason
    #[inline]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Reason text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BridgeError {
    fn from(reason: String) -> Self {
        Self(reason)
    }
}

impl From<&str> for BridgeError {
    fn from(reason: &str) -> Self {
        Self(reason.to_string())
    }
}

/// Result alias for core operations
pub type DeckResult<T> = Result<T, DeckError>;
