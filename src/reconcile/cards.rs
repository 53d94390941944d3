use crate::domain::{Board, CardId, CardUpdate, Column, ColumnId};
use crate::error::{ReorderError, Result};
use crate::reconcile::event::CardMove;

/// Computes the placement updates implied by moving one card.
///
/// Only cards whose `(column_id, order)` actually changes get an update.
/// Updates for the source column come first, then the destination column,
/// each in display order. The board is not modified.
///
/// # Examples
/// ```
/// use kanban_reorder::domain::{Board, BoardId, ColumnId};
/// use kanban_reorder::reconcile::{reconcile, CardMove};
///
/// let mut board = Board::new(BoardId::from("b"), "Board".into());
/// let todo = ColumnId::from("todo");
/// board.add_column(todo.clone(), "To Do".into());
/// let first = board.add_card(&todo, "First".into()).unwrap();
/// board.add_card(&todo, "Second".into()).unwrap();
///
/// let mv = CardMove {
///     card_id: first.id.clone(),
///     source_column: todo.clone(),
///     source_index: 0,
///     dest_column: todo.clone(),
///     dest_index: 1,
/// };
/// let updates = reconcile(&mv, &board).unwrap();
/// assert_eq!(updates.len(), 2);
/// assert_eq!(updates[1].card_id, first.id);
/// ```
pub fn reconcile(mv: &CardMove, board: &Board) -> Result<Vec<CardUpdate>> {
    let source = board
        .column(&mv.source_column)
        .ok_or_else(|| ReorderError::ColumnNotFound(mv.source_column.to_string()))?;
    let dest = board
        .column(&mv.dest_column)
        .ok_or_else(|| ReorderError::ColumnNotFound(mv.dest_column.to_string()))?;

    match source.cards.get(mv.source_index) {
        Some(card) if card.id == mv.card_id => {}
        Some(card) => {
            return Err(ReorderError::InvalidDrop(format!(
                "expected card {} at {}:{}, found {}",
                mv.card_id, source.id, mv.source_index, card.id
            )))
        }
        None => {
            return Err(ReorderError::InvalidDrop(format!(
                "source index {} out of range for column {} with {} cards",
                mv.source_index,
                source.id,
                source.cards.len()
            )))
        }
    }

    let mut source_ids = source.card_ids();
    let moved = source_ids.remove(mv.source_index);

    if !mv.is_cross_column() {
        let index = mv.dest_index.min(source_ids.len());
        source_ids.insert(index, moved);
        return Ok(changed(&source.id, &source_ids, source, dest));
    }

    let mut dest_ids = dest.card_ids();
    let index = mv.dest_index.min(dest_ids.len());
    dest_ids.insert(index, moved);

    let mut updates = changed(&source.id, &source_ids, source, dest);
    updates.extend(changed(&dest.id, &dest_ids, source, dest));
    Ok(updates)
}

/// Updates for the cards of `ids` (the new contents of `column_id`) whose
/// pre-move placement differs from their index in `ids`
fn changed(column_id: &ColumnId, ids: &[CardId], source: &Column, dest: &Column) -> Vec<CardUpdate> {
    ids.iter()
        .enumerate()
        .filter(|(order, id)| previous_placement(id, source, dest) != Some((column_id, *order)))
        .map(|(order, id)| CardUpdate::new(id.clone(), column_id.clone(), order))
        .collect()
}

fn previous_placement<'a>(
    id: &CardId,
    source: &'a Column,
    dest: &'a Column,
) -> Option<(&'a ColumnId, usize)> {
    source
        .cards
        .position(id)
        .map(|index| (&source.id, index))
        .or_else(|| dest.cards.position(id).map(|index| (&dest.id, index)))
}
