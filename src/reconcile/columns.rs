use crate::domain::{Board, ColumnUpdate};
use crate::error::{ReorderError, Result};
use crate::reconcile::event::ColumnMove;

/// Computes the order updates implied by moving one column within its board.
/// Same rules as card reconciliation, scoped to the board's column list.
pub fn reconcile_columns(mv: &ColumnMove, board: &Board) -> Result<Vec<ColumnUpdate>> {
    if mv.board_id != board.id {
        return Err(ReorderError::BoardNotFound(mv.board_id.to_string()));
    }

    match board.column_at(mv.source_index) {
        Some(column) if column.id == mv.column_id => {}
        Some(column) => {
            return Err(ReorderError::InvalidDrop(format!(
                "expected column {} at index {}, found {}",
                mv.column_id, mv.source_index, column.id
            )))
        }
        None => {
            return Err(ReorderError::InvalidDrop(format!(
                "column index {} out of range for board {} with {} columns",
                mv.source_index,
                board.id,
                board.columns.len()
            )))
        }
    }

    let mut ids = board.columns.keys();
    let moved = ids.remove(mv.source_index);
    let index = mv.dest_index.min(ids.len());
    ids.insert(index, moved);

    Ok(ids
        .into_iter()
        .enumerate()
        .filter(|(order, id)| board.columns.position(id) != Some(*order))
        .map(|(order, id)| ColumnUpdate::new(id, board.id.clone(), order))
        .collect())
}
