//! Operation registry
//!
//! Owns the in-flight operations and drives them through the state machine:
//! - Creation from advisory text (always PENDING)
//! - User-gated transitions (apply, cancel)
//! - Apply outcomes (completed, failed)
//! - Grace-period cleanup of terminal operations
//!
//! Pure in-memory state; every change is published on the [`EventBus`].

use crate::error::{DeckError, DeckResult, NotFoundKind};
use crate::events::{DeckEvent, EventBus};
use crate::extractor::ActionExtractor;
use crate::state_machine::validate_transition;
use crate::types::{Operation, OperationId, OperationPreview, OperationState};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Registry of operations keyed by id, kept in creation order
#[derive(Debug)]
pub struct OperationRegistry {
    operations: Mutex<IndexMap<OperationId, Operation>>,
    next_id: AtomicU64,
    grace: Duration,
    events: EventBus,
}

impl OperationRegistry {
    /// Create registry with the grace interval used by [`Self::sweep_expired`]
    #[must_use]
    pub fn new(grace: Duration, events: EventBus) -> Self {
        Self {
            operations: Mutex::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
            grace,
            events,
        }
    }

    /// Create a PENDING operation
    ///
    /// # Errors
    /// - `DeckError::InvalidOperation` if `context` or `kind` is empty
    pub fn create(
        &self,
        kind: &str,
        label: &str,
        context: impl Into<Arc<str>>,
    ) -> DeckResult<Operation> {
        let context = context.into();
        if context.trim().is_empty() {
            return Err(DeckError::InvalidOperation(
                "source context must not be empty".to_string(),
            ));
        }
        if kind.is_empty() {
            return Err(DeckError::InvalidOperation(
                "kind must not be empty".to_string(),
            ));
        }

        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let operation = Operation {
            id,
            kind: kind.to_string(),
            label: label.to_string(),
            source_context: context,
            state: OperationState::Pending,
            failure: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        self.operations.lock().insert(id, operation.clone());
        tracing::info!(operation = %id, kind, label, "operation proposed");
        self.events.publish(DeckEvent::OperationCreated {
            id,
            kind: kind.to_string(),
            label: label.to_string(),
        });

        Ok(operation)
    }

    /// Extract every marker in `text` and create one operation per match
    ///
    /// Identical markers produce distinct operations. Text without markers
    /// creates nothing.
    pub fn create_from_text(&self, text: &str) -> Vec<Operation> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let context: Arc<str> = Arc::from(text);
        let created: Vec<Operation> = ActionExtractor::new()
            .extract(text)
            .filter_map(|marker| {
                self.create(marker.kind, marker.label, Arc::clone(&context))
                    .ok()
            })
            .collect();

        tracing::debug!(count = created.len(), "extracted operations");
        created
    }

    /// Get operation by id
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent
    pub fn get(&self, id: OperationId) -> DeckResult<Operation> {
        self.operations
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Operation, id.to_string()))
    }

    /// Read-only preview, available in any state
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent
    pub fn preview(&self, id: OperationId) -> DeckResult<OperationPreview> {
        self.get(id).map(|op| op.preview())
    }

    /// Cancel a PENDING operation and drop it from the active set
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent (including already cancelled)
    /// - `DeckError::InvalidTransition` if the operation is not PENDING
    pub fn cancel(&self, id: OperationId) -> DeckResult<Operation> {
        let mut operations = self.operations.lock();
        let current = operations
            .get(&id)
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Operation, id.to_string()))?;

        check_edge(id, current.state, OperationState::Cancelled)?;

        let mut operation = operations
            .shift_remove(&id)
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Operation, id.to_string()))?;
        drop(operations);

        let from = operation.state;
        operation.state = OperationState::Cancelled;
        tracing::info!(operation = %id, label = %operation.label, "operation cancelled");
        self.events.publish(DeckEvent::OperationTransitioned {
            id,
            from,
            to: OperationState::Cancelled,
        });
        self.events.publish(DeckEvent::OperationCancelled { id });

        Ok(operation)
    }

    /// Move an operation along a state edge
    ///
    /// Reaching `Cancelled` through this method also drops the operation.
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent
    /// - `DeckError::InvalidTransition` if the edge is illegal; state is unchanged
    pub fn transition_to(&self, id: OperationId, to: OperationState) -> DeckResult<Operation> {
        if to == OperationState::Cancelled {
            return self.cancel(id);
        }
        self.transition_with(id, to, None)
    }

    /// Move an APPLYING operation to FAILED, retaining the upstream error
    ///
    /// # Errors
    /// Same as [`Self::transition_to`]
    pub fn fail(&self, id: OperationId, reason: impl Into<String>) -> DeckResult<Operation> {
        self.transition_with(id, OperationState::Failed, Some(reason.into()))
    }

    fn transition_with(
        &self,
        id: OperationId,
        to: OperationState,
        failure: Option<String>,
    ) -> DeckResult<Operation> {
        let mut operations = self.operations.lock();
        let operation = operations
            .get_mut(&id)
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Operation, id.to_string()))?;

        let from = operation.state;
        if let Err(err) = check_edge(id, from, to) {
            tracing::warn!(operation = %id, %from, %to, "rejected state transition");
            return Err(err);
        }

        operation.state = to;
        if failure.is_some() {
            operation.failure = failure;
        }
        if matches!(to, OperationState::Completed | OperationState::Failed) {
            operation.finished_at = Some(Instant::now());
        }
        let snapshot = operation.clone();
        drop(operations);

        tracing::info!(operation = %id, %from, %to, "operation transitioned");
        self.events
            .publish(DeckEvent::OperationTransitioned { id, from, to });

        Ok(snapshot)
    }

    /// All active operations in creation order
    #[must_use]
    pub fn list(&self) -> Vec<Operation> {
        self.operations.lock().values().cloned().collect()
    }

    /// Drop a terminal operation before its grace interval has passed
    ///
    /// # Errors
    /// - `DeckError::NotFound` if absent
    /// - `DeckError::InvalidTransition` if the operation is not terminal
    pub fn dismiss(&self, id: OperationId) -> DeckResult<Operation> {
        let mut operations = self.operations.lock();
        let state = operations
            .get(&id)
            .map(|op| op.state)
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Operation, id.to_string()))?;

        if !state.is_terminal() {
            return Err(DeckError::InvalidTransition {
                id,
                from: state,
                to: OperationState::Completed,
            });
        }

        let removed = operations
            .shift_remove(&id)
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Operation, id.to_string()))?;
        drop(operations);

        self.events.publish(DeckEvent::OperationRemoved { id });
        Ok(removed)
    }

    /// Remove COMPLETED/FAILED operations older than the grace interval
    ///
    /// Returns ids removed, oldest first.
    pub fn sweep_expired(&self, now: Instant) -> Vec<OperationId> {
        let mut removed = Vec::new();
        self.operations.lock().retain(|id, op| {
            let expired = op
                .finished_at
                .is_some_and(|at| now.saturating_duration_since(at) >= self.grace);
            if expired {
                removed.push(*id);
            }
            !expired
        });

        for id in &removed {
            tracing::debug!(operation = %id, "expired operation removed");
            self.events.publish(DeckEvent::OperationRemoved { id: *id });
        }
        removed
    }

    /// Ids of every PENDING operation
    #[must_use]
    pub fn pending_ids(&self) -> Vec<OperationId> {
        self.operations
            .lock()
            .values()
            .filter(|op| op.is_pending())
            .map(|op| op.id)
            .collect()
    }

    /// Number of active operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.lock().len()
    }

    /// Check if no operation is active
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.lock().is_empty()
    }

    /// Grace interval for terminal operations
    #[inline]
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }
}

fn check_edge(id: OperationId, from: OperationState, to: OperationState) -> DeckResult<()> {
    validate_transition(from, to).map_err(|_| DeckError::InvalidTransition { id, from, to })
}
