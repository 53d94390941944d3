use crate::domain::card::Card;
use crate::domain::ids::{BoardId, CardId, ColumnId};
use crate::domain::ordered::{Ordered, OrderedCollection};
use crate::domain::placement::{CardUpdate, Placement};
use crate::error::{ReorderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A board column and the cards it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub board_id: BoardId,
    pub name: String,
    pub order: usize,
    #[serde(default)]
    pub cards: OrderedCollection<Card>,
}

impl Column {
    pub fn new(id: ColumnId, board_id: BoardId, name: String) -> Self {
        Self {
            id,
            board_id,
            name,
            order: 0,
            cards: OrderedCollection::new(),
        }
    }

    /// Card ids in display order
    pub fn card_ids(&self) -> Vec<CardId> {
        self.cards.keys()
    }
}

impl Ordered for Column {
    type Key = ColumnId;

    fn key(&self) -> &ColumnId {
        &self.id
    }

    fn order(&self) -> usize {
        self.order
    }

    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
}

/// Kanban board state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub columns: OrderedCollection<Column>,
}

impl Board {
    pub fn new(id: BoardId, name: String) -> Self {
        Self {
            id,
            name,
            archived: false,
            columns: OrderedCollection::new(),
        }
    }

    /// Appends a column with the given id and returns its order
    pub fn add_column(&mut self, id: ColumnId, name: String) -> usize {
        let column = Column::new(id, self.id.clone(), name);
        self.columns.push(column)
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.find(id)
    }

    /// Column at a display position
    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.columns.iter().find_map(|column| column.cards.find(id))
    }

    /// Column and index currently holding the card
    pub fn locate_card(&self, id: &CardId) -> Option<(ColumnId, usize)> {
        self.columns.iter().find_map(|column| {
            column
                .cards
                .position(id)
                .map(|index| (column.id.clone(), index))
        })
    }

    /// Creates a card at the end of a column
    pub fn add_card(&mut self, column_id: &ColumnId, title: String) -> Result<Card> {
        let card = Card::new(CardId::generate(), column_id.clone(), title);
        self.insert_card(card)
    }

    /// Appends an existing card to the column named by its `column_id`,
    /// assigning `order = length` of that column
    pub fn insert_card(&mut self, card: Card) -> Result<Card> {
        if self.card(&card.id).is_some() {
            return Err(ReorderError::InvariantViolation {
                scope: format!("board {}", self.id),
                detail: format!("card {} already exists", card.id),
            });
        }
        let column_id = card.column_id.clone();
        self.columns
            .edit(&column_id, |column| {
                let order = column.cards.push(card);
                column.cards.get(order).cloned()
            })
            .flatten()
            .ok_or_else(|| ReorderError::ColumnNotFound(column_id.to_string()))
    }

    /// Deletes a card and renumbers every card behind it.
    ///
    /// Returns the removed card and the placement updates for the cards
    /// that shifted up.
    pub fn remove_card(&mut self, id: &CardId) -> Result<(Card, Vec<CardUpdate>)> {
        let (column_id, index) = self
            .locate_card(id)
            .ok_or_else(|| ReorderError::CardNotFound(id.to_string()))?;

        self.columns
            .edit(&column_id, |column| {
                let removed = column.cards.remove_at(index)?;
                let shifted = column
                    .cards
                    .iter()
                    .skip(index)
                    .map(|card| CardUpdate::new(card.id.clone(), column.id.clone(), card.order))
                    .collect();
                Some((removed, shifted))
            })
            .flatten()
            .ok_or_else(|| ReorderError::CardNotFound(id.to_string()))
    }

    /// Checks that column and card orders are dense and that every card
    /// sits in exactly the column its `column_id` names
    pub fn validate(&self) -> Result<()> {
        self.columns.check_dense(&format!("board {}", self.id))?;

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if column.board_id != self.id {
                return Err(ReorderError::InvariantViolation {
                    scope: format!("board {}", self.id),
                    detail: format!("column {} belongs to board {}", column.id, column.board_id),
                });
            }
            column.cards.check_dense(&format!("column {}", column.id))?;
            for card in &column.cards {
                if card.column_id != column.id {
                    return Err(ReorderError::InvariantViolation {
                        scope: format!("column {}", column.id),
                        detail: format!("card {} claims column {}", card.id, card.column_id),
                    });
                }
                if !seen.insert(&card.id) {
                    return Err(ReorderError::InvariantViolation {
                        scope: format!("board {}", self.id),
                        detail: format!("card {} appears in more than one column", card.id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Order-only view of the board
    pub fn placement(&self) -> Placement {
        let mut placement = Placement::default();
        for column in &self.columns {
            placement.columns.insert(column.id.clone(), column.order);
            for card in &column.cards {
                placement
                    .cards
                    .insert(card.id.clone(), (column.id.clone(), card.order));
            }
        }
        placement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_columns() -> Board {
        let mut board = Board::new(BoardId::from("b1"), "Sprint".to_string());
        board.add_column(ColumnId::from("todo"), "To Do".to_string());
        board.add_column(ColumnId::from("done"), "Done".to_string());
        board
    }

    #[test]
    fn test_board_creation() {
        let board = board_with_columns();
        assert!(!board.archived);
        assert_eq!(board.columns.len(), 2);
        assert_eq!(board.column_at(1).unwrap().id.as_str(), "done");
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_add_card_appends_with_current_length() {
        let mut board = board_with_columns();
        let todo = ColumnId::from("todo");

        let first = board.add_card(&todo, "First".into()).unwrap();
        let second = board.add_card(&todo, "Second".into()).unwrap();

        assert_eq!(first.order, 0);
        assert_eq!(second.order, 1);
        assert_eq!(board.locate_card(&second.id), Some((todo, 1)));
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_add_card_to_unknown_column() {
        let mut board = board_with_columns();
        let result = board.add_card(&ColumnId::from("nope"), "X".into());
        assert!(matches!(result, Err(ReorderError::ColumnNotFound(_))));
    }

    #[test]
    fn test_insert_duplicate_card_rejected() {
        let mut board = board_with_columns();
        let card = board.add_card(&ColumnId::from("todo"), "X".into()).unwrap();
        assert!(board.insert_card(card).is_err());
    }

    #[test]
    fn test_remove_card_renumbers_followers() {
        let mut board = board_with_columns();
        let todo = ColumnId::from("todo");
        let a = board.add_card(&todo, "A".into()).unwrap();
        let b = board.add_card(&todo, "B".into()).unwrap();
        let c = board.add_card(&todo, "C".into()).unwrap();

        let (removed, shifted) = board.remove_card(&a.id).unwrap();

        assert_eq!(removed.id, a.id);
        assert_eq!(
            shifted,
            vec![
                CardUpdate::new(b.id.clone(), todo.clone(), 0),
                CardUpdate::new(c.id.clone(), todo.clone(), 1),
            ]
        );
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_remove_last_card_shifts_nothing() {
        let mut board = board_with_columns();
        let todo = ColumnId::from("todo");
        board.add_card(&todo, "A".into()).unwrap();
        let b = board.add_card(&todo, "B".into()).unwrap();

        let (_, shifted) = board.remove_card(&b.id).unwrap();
        assert!(shifted.is_empty());
    }

    #[test]
    fn test_validate_detects_misfiled_card() {
        let mut board = board_with_columns();
        let todo = ColumnId::from("todo");
        let card = board.add_card(&todo, "A".into()).unwrap();
        board.columns.edit(&todo, |column| {
            column.cards.edit(&card.id, |c| c.column_id = ColumnId::from("done"));
        });

        assert!(matches!(
            board.validate(),
            Err(ReorderError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_board_serialization_round_trip() {
        let mut board = board_with_columns();
        board.add_card(&ColumnId::from("done"), "Shipped".into()).unwrap();

        let json = serde_json::to_string(&board).unwrap();
        let back: Board = serde_json::from_str(&json).unwrap();

        assert_eq!(back, board);
        assert!(back.validate().is_ok());
    }
}
