//! Core types for NixDeck
//!
//! Defines the fundamental records of the apply engine:
//! - Operation identity and lifecycle state
//! - Operations proposed by advisory text
//! - Snapshots taken before a mutation
//! - Plain bridge payloads (service descriptors, command output)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Process-unique operation identifier, assigned monotonically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Lifecycle state of an operation
///
/// ```text
/// Pending --apply--> Applying --success--> Completed
///    |                   +-----failure---> Failed
///    +------cancel-----------------------> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    /// Proposed, awaiting a user decision
    Pending,
    /// Backup and apply sequence running
    Applying,
    /// Applied successfully
    Completed,
    /// Apply failed; error retained on the operation
    Failed,
    /// Dropped by the user before applying
    Cancelled,
}

impl OperationState {
    /// Check if no further transitions are possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase label used in logs and display
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Applying => "applying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed mutating action extracted from advisory text
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique id
    pub id: OperationId,
    /// Open kind tag (service, job, container, config, ...)
    pub kind: String,
    /// Human-readable name
    pub label: String,
    /// Full advisory text the marker was found in
    pub source_context: Arc<str>,
    /// Current lifecycle state
    pub state: OperationState,
    /// Upstream error retained when the operation failed
    pub failure: Option<String>,
    /// Wall-clock creation time
    pub created_at: DateTime<Utc>,
    /// Monotonic time the operation reached Completed or Failed
    pub(crate) finished_at: Option<Instant>,
}

impl Operation {
    /// Check if operation is still awaiting a decision
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == OperationState::Pending
    }

    /// Read-only preview of the operation
    #[must_use]
    pub fn preview(&self) -> OperationPreview {
        OperationPreview {
            id: self.id,
            kind: self.kind.clone(),
            label: self.label.clone(),
            state: self.state,
            source_context: self.source_context.to_string(),
            failure: self.failure.clone(),
        }
    }
}

/// Read-only view of an operation shown before the user decides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPreview {
    /// Operation id
    pub id: OperationId,
    /// Kind tag
    pub kind: String,
    /// Label
    pub label: String,
    /// State at the time of the query
    pub state: OperationState,
    /// Surrounding rationale
    pub source_context: String,
    /// Failure reason, if any
    pub failure: Option<String>,
}

/// Immutable backup point created immediately before an apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Deterministic name: `{prefix}{target}-{unix millis}`
    pub name: String,
    /// Target the snapshot protects
    pub target: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Name a snapshot for a target at a given time
    ///
    /// Names resolve to the millisecond. Two snapshots of one target taken
    /// within the same millisecond share a name; backends that reject
    /// duplicate names will fail the second backup.
    #[must_use]
    pub fn for_target(prefix: &str, target: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            name: format!("{prefix}{target}-{}", created_at.timestamp_millis()),
            target: target.to_string(),
            created_at,
        }
    }
}

/// Service unit as reported by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unit name
    pub name: String,
    /// Free-form status line
    pub status: String,
}

/// Result of running a shell command through the bridge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Whether the command exited successfully
    pub success: bool,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with stdout text
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with stderr text
    #[must_use]
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}
