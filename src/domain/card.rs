use crate::domain::ids::{CardId, ColumnId};
use crate::domain::ordered::Ordered;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A kanban card
///
/// Placement is the `(column_id, order)` pair. Everything else is carried
/// through untouched by the reordering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub column_id: ColumnId,
    pub order: usize,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Creates a card in the given column. Its order is assigned when it is
    /// added to the column.
    pub fn new(id: CardId, column_id: ColumnId, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            column_id,
            order: 0,
            title,
            description: None,
            due_date: None,
            assignees: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the card to a new placement in one step
    pub(crate) fn place(&mut self, column_id: ColumnId, order: usize) {
        self.column_id = column_id;
        self.order = order;
        self.updated_at = Utc::now();
    }
}

impl Ordered for Card {
    type Key = CardId;

    fn key(&self) -> &CardId {
        &self.id
    }

    fn order(&self) -> usize {
        self.order
    }

    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
}
