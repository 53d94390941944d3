use crate::storage::BackendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReorderError>;

/// A single mutation that the backend refused, keyed by the entity id
#[derive(Debug, Clone, PartialEq)]
pub struct FailedUpdate {
    pub id: String,
    pub error: BackendError,
}

#[derive(Debug, Error)]
pub enum ReorderError {
    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Invalid drop: {0}")]
    InvalidDrop(String),

    #[error("Order invariant violated in {scope}: {detail}")]
    InvariantViolation { scope: String, detail: String },

    #[error("A drag is already in progress ({phase})")]
    DragInProgress { phase: String },

    #[error("No drag in progress")]
    NoActiveDrag,

    #[error("Board {board} kept changing while being fetched ({attempts} attempts)")]
    StaleFetch { board: String, attempts: usize },

    #[error("Invalid drag phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("Change rolled back: {} of {attempted} requests failed", .failures.len())]
    RolledBack {
        attempted: usize,
        failures: Vec<FailedUpdate>,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
