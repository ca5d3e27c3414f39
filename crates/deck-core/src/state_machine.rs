use crate::types::OperationState;

/// Error returned when an edge is not part of the operation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from} -> {to}")]
pub struct IllegalTransition {
    /// Current state
    pub from: OperationState,
    /// Requested state
    pub to: OperationState,
}

/// Validates a state transition.
///
/// Terminal states have no outgoing edges; `Applying` cannot be cancelled.
pub fn validate_transition(
    from: OperationState,
    to: OperationState,
) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step.
pub fn allowed_transitions(from: OperationState) -> &'static [OperationState] {
    use OperationState::*;
    match from {
        Pending => &[Applying, Cancelled],
        Applying => &[Completed, Failed],
        Completed | Failed | Cancelled => &[],
    }
}
