//! Pure reordering logic.
//!
//! Given the pre-move board and a drop, compute the minimal set of
//! placement updates that restores dense ordering in every affected scope.
//! Nothing here mutates state or suspends.

pub mod cards;
pub mod columns;
pub mod event;

pub use cards::reconcile;
pub use columns::reconcile_columns;
pub use event::{CardMove, ColumnMove, DragKind, DropEvent, DropLocation};
