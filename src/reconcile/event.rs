//! Drop payloads as delivered by the drag-gesture layer.

use crate::domain::{BoardId, CardId, ColumnId};
use crate::error::{ReorderError, Result};
use serde::{Deserialize, Serialize};

/// What is being dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Card,
    Column,
}

impl std::fmt::Display for DragKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::Column => write!(f, "column"),
        }
    }
}

/// A container and index inside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropLocation {
    pub container_id: String,
    pub index: usize,
}

impl DropLocation {
    pub fn new(container_id: impl Into<String>, index: usize) -> Self {
        Self {
            container_id: container_id.into(),
            index,
        }
    }
}

/// A finished drag gesture.
///
/// For card drags the containers are columns; for column drags the
/// container is the board. `destination` is `None` when the item was
/// released outside any container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropEvent {
    pub draggable_id: String,
    pub kind: DragKind,
    pub source: DropLocation,
    pub destination: Option<DropLocation>,
}

impl DropEvent {
    pub fn card(
        card_id: impl Into<String>,
        source: DropLocation,
        destination: Option<DropLocation>,
    ) -> Self {
        Self {
            draggable_id: card_id.into(),
            kind: DragKind::Card,
            source,
            destination,
        }
    }

    pub fn column(
        column_id: impl Into<String>,
        source: DropLocation,
        destination: Option<DropLocation>,
    ) -> Self {
        Self {
            draggable_id: column_id.into(),
            kind: DragKind::Column,
            source,
            destination,
        }
    }

    /// Typed card move, or `None` if the card was dropped outside any column
    pub fn card_move(&self) -> Result<Option<CardMove>> {
        self.expect_kind(DragKind::Card)?;
        Ok(self.destination.as_ref().map(|dest| CardMove {
            card_id: CardId::from(self.draggable_id.as_str()),
            source_column: ColumnId::from(self.source.container_id.as_str()),
            source_index: self.source.index,
            dest_column: ColumnId::from(dest.container_id.as_str()),
            dest_index: dest.index,
        }))
    }

    /// Typed column move, or `None` if the column was dropped outside the board
    pub fn column_move(&self) -> Result<Option<ColumnMove>> {
        self.expect_kind(DragKind::Column)?;
        let Some(dest) = self.destination.as_ref() else {
            return Ok(None);
        };
        if dest.container_id != self.source.container_id {
            return Err(ReorderError::InvalidDrop(format!(
                "column {} cannot move from board {} to board {}",
                self.draggable_id, self.source.container_id, dest.container_id
            )));
        }
        Ok(Some(ColumnMove {
            column_id: ColumnId::from(self.draggable_id.as_str()),
            board_id: BoardId::from(self.source.container_id.as_str()),
            source_index: self.source.index,
            dest_index: dest.index,
        }))
    }

    fn expect_kind(&self, kind: DragKind) -> Result<()> {
        if self.kind != kind {
            return Err(ReorderError::InvalidDrop(format!(
                "expected a {} drag, got a {} drag",
                kind, self.kind
            )));
        }
        Ok(())
    }
}

/// A card moving from one `(column, index)` to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMove {
    pub card_id: CardId,
    pub source_column: ColumnId,
    pub source_index: usize,
    pub dest_column: ColumnId,
    pub dest_index: usize,
}

impl CardMove {
    pub fn is_cross_column(&self) -> bool {
        self.source_column != self.dest_column
    }
}

/// A column moving within its board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMove {
    pub column_id: ColumnId,
    pub board_id: BoardId,
    pub source_index: usize,
    pub dest_index: usize,
}
