use crate::domain::ids::{BoardId, CardId, ColumnId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full target placement of one card: the body of `PUT /cards/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardUpdate {
    pub card_id: CardId,
    pub column_id: ColumnId,
    pub order: usize,
}

impl CardUpdate {
    pub fn new(card_id: CardId, column_id: ColumnId, order: usize) -> Self {
        Self {
            card_id,
            column_id,
            order,
        }
    }
}

/// Full target placement of one column: the body of `PUT /columns/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnUpdate {
    pub column_id: ColumnId,
    pub board_id: BoardId,
    pub order: usize,
}

impl ColumnUpdate {
    pub fn new(column_id: ColumnId, board_id: BoardId, order: usize) -> Self {
        Self {
            column_id,
            board_id,
            order,
        }
    }
}

/// Where every card and column of a board sits, ignoring all other fields.
/// Two boards with equal placements render the same ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub columns: BTreeMap<ColumnId, usize>,
    pub cards: BTreeMap<CardId, (ColumnId, usize)>,
}

impl Placement {
    /// Cards whose placement differs between `self` and `other`, including
    /// cards present on only one side
    pub fn diverging_cards(&self, other: &Placement) -> Vec<CardId> {
        let mut ids: Vec<CardId> = self
            .cards
            .iter()
            .filter(|(id, place)| other.cards.get(*id) != Some(*place))
            .map(|(id, _)| id.clone())
            .collect();
        ids.extend(
            other
                .cards
                .keys()
                .filter(|id| !self.cards.contains_key(*id))
                .cloned(),
        );
        ids.sort();
        ids
    }
}
