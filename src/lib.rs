//! # Kanban Reorder
//!
//! Drag-and-drop reordering engine for kanban boards.
//!
//! A drop is turned into the minimal set of `(column, order)` changes by a
//! pure reconciler, applied immediately to an optimistic local cache, and
//! sent to the backend as independent per-row updates. If any update fails
//! the whole drop is rolled back locally, keeping every column densely
//! ordered.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod reconcile;
pub mod storage;
pub mod sync;

// Re-export commonly used types
pub use cache::{OptimisticCache, SharedCache, Snapshot};
pub use config::{RollbackPolicy, SyncConfig};
pub use dispatch::{DispatchReport, MutationDispatcher};
pub use domain::{Board, BoardId, Card, CardId, CardUpdate, Column, ColumnId, ColumnUpdate};
pub use error::{ReorderError, Result};
pub use reconcile::{reconcile, reconcile_columns, DragKind, DropEvent, DropLocation};
pub use storage::{BackendError, BackendErrorKind, BoardBackend, FileBackend};
pub use sync::{BoardSync, ConsistencyCheck, DragPhase, DropOutcome, Notifier};
