use crate::domain::{Board, BoardId, Card, CardId, CardUpdate, ColumnUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod file_storage;

pub use file_storage::FileBackend;

/// How a backend request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendErrorKind {
    /// Transient transport failure; retriable in principle
    Network,
    /// The backend rejected the request (unknown id, constraint violation)
    Validation,
}

/// Error returned by a single backend request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Validation,
            message: message.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind == BackendErrorKind::Network
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BackendErrorKind::Network => write!(f, "network error: {}", self.message),
            BackendErrorKind::Validation => write!(f, "validation error: {}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

/// Row-level backend contract.
///
/// Every call touches exactly one entity and carries its full target
/// state, so calls may be issued concurrently and arrive in any order.
#[async_trait]
pub trait BoardBackend: Send + Sync {
    /// Writes a card's placement and returns the placement the backend stored
    async fn update_card(&self, update: &CardUpdate) -> Result<CardUpdate, BackendError>;

    /// Writes a column's order and returns the order the backend stored
    async fn update_column(&self, update: &ColumnUpdate) -> Result<ColumnUpdate, BackendError>;

    /// Creates a card
    async fn create_card(&self, card: &Card) -> Result<Card, BackendError>;

    /// Deletes a card
    async fn delete_card(&self, id: &CardId) -> Result<(), BackendError>;

    /// Fetches the authoritative state of a board
    async fn fetch_board(&self, id: &BoardId) -> Result<Board, BackendError>;
}
