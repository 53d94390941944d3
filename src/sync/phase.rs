use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the controller is in the life of one gesture (or one direct edit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    Idle,
    Dragging,
    Reconciling,
    Committing,
    Committed,
    RolledBack,
}

impl fmt::Display for DragPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Dragging => write!(f, "Dragging"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Committing => write!(f, "Committing"),
            Self::Committed => write!(f, "Committed"),
            Self::RolledBack => write!(f, "Rolled Back"),
        }
    }
}

impl DragPhase {
    /// Checks if a phase transition is valid
    pub fn can_transition_to(&self, target: &DragPhase) -> bool {
        matches!(
            (self, target),
            // Gesture start, or a direct create/delete skipping the drag
            (Self::Idle, Self::Dragging)
                | (Self::Idle, Self::Reconciling)
                // Drop received, or drag cancelled
                | (Self::Dragging, Self::Reconciling)
                | (Self::Dragging, Self::Idle)
                // Requests in flight, nothing to send, or malformed drop
                | (Self::Reconciling, Self::Committing)
                | (Self::Reconciling, Self::Committed)
                | (Self::Reconciling, Self::Idle)
                | (Self::Committing, Self::Committed)
                | (Self::Committing, Self::RolledBack)
                | (Self::Committed, Self::Idle)
                | (Self::RolledBack, Self::Idle)
        )
    }

    /// Only `Idle` accepts a new gesture
    pub fn is_idle(&self) -> bool {
        *self == Self::Idle
    }
}
