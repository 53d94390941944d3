//! Local read model of a board, updated optimistically.
//!
//! The cache is the only owner of card and column order values on the
//! client side. Every write is all-or-nothing: new column contents are
//! built and checked for dense ordering before they replace the old ones,
//! so readers never observe a half-applied change.

use crate::domain::{
    Board, BoardId, Card, CardId, CardUpdate, Column, ColumnId, ColumnUpdate, OrderedCollection,
};
use crate::error::{ReorderError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cache handle shared between the sync controller and UI readers
pub type SharedCache = Arc<RwLock<OptimisticCache>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotScope {
    /// The listed columns with their cards
    Columns,
    /// Every column of the board, including column order
    Board,
}

/// Immutable copy of part of the cache, taken before a write
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    board_id: BoardId,
    scope: SnapshotScope,
    columns: Vec<Column>,
    version: u64,
}

impl Snapshot {
    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Cache version the snapshot was taken at
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn covers(&self, column_id: &ColumnId) -> bool {
        self.columns.iter().any(|c| &c.id == column_id)
    }

    /// Placement the card had when the snapshot was taken
    pub fn card_placement(&self, id: &CardId) -> Option<CardUpdate> {
        self.columns.iter().find_map(|column| {
            column
                .cards
                .find(id)
                .map(|card| CardUpdate::new(card.id.clone(), column.id.clone(), card.order))
        })
    }

    /// Order the column had when the snapshot was taken
    pub fn column_placement(&self, id: &ColumnId) -> Option<ColumnUpdate> {
        if self.scope != SnapshotScope::Board {
            return None;
        }
        self.columns
            .iter()
            .find(|c| &c.id == id)
            .map(|c| ColumnUpdate::new(c.id.clone(), self.board_id.clone(), c.order))
    }
}

/// Optimistic mirror of one board
#[derive(Debug)]
pub struct OptimisticCache {
    board: Board,
    version: u64,
}

impl OptimisticCache {
    /// Creates a cache seeded with server state
    pub fn new(board: Board) -> Result<Self> {
        board.validate()?;
        Ok(Self { board, version: 0 })
    }

    /// Wraps the cache for sharing with the controller and readers
    pub fn into_shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Incremented on every successful write
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Copies the given columns (with their cards)
    pub fn snapshot(&self, column_ids: &[ColumnId]) -> Result<Snapshot> {
        let mut columns: Vec<Column> = Vec::with_capacity(column_ids.len());
        for id in column_ids {
            if columns.iter().any(|c| &c.id == id) {
                continue;
            }
            let column = self
                .board
                .column(id)
                .ok_or_else(|| ReorderError::ColumnNotFound(id.to_string()))?;
            columns.push(column.clone());
        }
        Ok(Snapshot {
            board_id: self.board.id.clone(),
            scope: SnapshotScope::Columns,
            columns,
            version: self.version,
        })
    }

    /// Copies every column, preserving column order
    pub fn snapshot_board(&self) -> Snapshot {
        Snapshot {
            board_id: self.board.id.clone(),
            scope: SnapshotScope::Board,
            columns: self.board.columns.as_slice().to_vec(),
            version: self.version,
        }
    }

    /// Applies one drop's card placements at once.
    ///
    /// Every column that loses or gains a card is rebuilt and must end up
    /// densely ordered; otherwise nothing changes.
    pub fn apply(&mut self, updates: &[CardUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut targets: BTreeMap<&CardId, &CardUpdate> = BTreeMap::new();
        let mut affected: Vec<ColumnId> = Vec::new();
        for update in updates {
            let (current, _) = self
                .board
                .locate_card(&update.card_id)
                .ok_or_else(|| ReorderError::CardNotFound(update.card_id.to_string()))?;
            if self.board.column(&update.column_id).is_none() {
                return Err(ReorderError::ColumnNotFound(update.column_id.to_string()));
            }
            if targets.insert(&update.card_id, update).is_some() {
                return Err(ReorderError::InvariantViolation {
                    scope: format!("board {}", self.board.id),
                    detail: format!("card {} updated twice in one batch", update.card_id),
                });
            }
            for column_id in [current, update.column_id.clone()] {
                if !affected.contains(&column_id) {
                    affected.push(column_id);
                }
            }
        }

        let mut rebuilt: Vec<(ColumnId, Vec<Card>)> =
            affected.iter().map(|id| (id.clone(), Vec::new())).collect();
        for column_id in &affected {
            let Some(column) = self.board.column(column_id) else {
                continue;
            };
            for card in &column.cards {
                let mut card = card.clone();
                if let Some(target) = targets.get(&card.id) {
                    card.place(target.column_id.clone(), target.order);
                }
                if let Some((_, cards)) = rebuilt.iter_mut().find(|(id, _)| id == &card.column_id) {
                    cards.push(card);
                }
            }
        }

        let mut collections = Vec::with_capacity(rebuilt.len());
        for (column_id, mut cards) in rebuilt {
            cards.sort_by_key(|card| card.order);
            let collection = OrderedCollection::from_raw(cards);
            collection.check_dense(&format!("column {}", column_id))?;
            collections.push((column_id, collection));
        }

        for (column_id, collection) in collections {
            self.board
                .columns
                .edit(&column_id, |column| column.cards = collection);
        }
        self.version += 1;
        tracing::debug!(
            board = %self.board.id,
            updates = updates.len(),
            version = self.version,
            "applied card placements"
        );
        Ok(())
    }

    /// Applies one drop's column orders at once
    pub fn apply_columns(&mut self, updates: &[ColumnUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut columns = self.board.columns.as_slice().to_vec();
        for update in updates {
            if update.board_id != self.board.id {
                return Err(ReorderError::BoardNotFound(update.board_id.to_string()));
            }
            let column = columns
                .iter_mut()
                .find(|c| c.id == update.column_id)
                .ok_or_else(|| ReorderError::ColumnNotFound(update.column_id.to_string()))?;
            column.order = update.order;
        }
        columns.sort_by_key(|c| c.order);

        let collection = OrderedCollection::from_raw(columns);
        collection.check_dense(&format!("board {}", self.board.id))?;

        self.board.columns = collection;
        self.version += 1;
        tracing::debug!(
            board = %self.board.id,
            updates = updates.len(),
            version = self.version,
            "applied column orders"
        );
        Ok(())
    }

    /// Puts snapshots back as one write. The restored board must be
    /// consistent as a whole, so every column a change touched has to be
    /// restored together.
    pub fn restore(&mut self, snapshots: &[Snapshot]) -> Result<()> {
        let mut board = self.board.clone();
        for snapshot in snapshots {
            if snapshot.board_id != board.id {
                return Err(ReorderError::BoardNotFound(snapshot.board_id.to_string()));
            }
            match snapshot.scope {
                SnapshotScope::Board => {
                    board.columns = OrderedCollection::from_raw(snapshot.columns.clone());
                }
                SnapshotScope::Columns => {
                    for saved in &snapshot.columns {
                        board
                            .columns
                            .edit(&saved.id, |column| *column = saved.clone())
                            .ok_or_else(|| ReorderError::ColumnNotFound(saved.id.to_string()))?;
                    }
                }
            }
        }
        board.validate()?;

        self.board = board;
        self.version += 1;
        tracing::debug!(
            board = %self.board.id,
            snapshots = snapshots.len(),
            version = self.version,
            "restored snapshots"
        );
        Ok(())
    }

    /// Replaces the whole read model with authoritative server state
    pub fn replace(&mut self, board: Board) -> Result<()> {
        if board.id != self.board.id {
            return Err(ReorderError::BoardNotFound(board.id.to_string()));
        }
        board.validate()?;
        self.board = board;
        self.version += 1;
        Ok(())
    }

    /// Appends a new card to the end of its column
    pub fn insert_card(&mut self, card: Card) -> Result<Card> {
        let card = self.board.insert_card(card)?;
        self.version += 1;
        Ok(card)
    }

    /// Removes a card; returns it with the placements of the cards that moved up
    pub fn remove_card(&mut self, id: &CardId) -> Result<(Card, Vec<CardUpdate>)> {
        let removed = self.board.remove_card(id)?;
        self.version += 1;
        Ok(removed)
    }
}
