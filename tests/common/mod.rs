#![allow(dead_code)]

use async_trait::async_trait;
use kanban_reorder::domain::OrderedCollection;
use kanban_reorder::{
    BackendError, Board, BoardBackend, BoardId, Card, CardId, CardUpdate, Column, ColumnId,
    ColumnUpdate, Notifier, ReorderError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Board "b": A = [card1, card2, card3], B = [card4, card5], C = []
pub fn sample_board() -> Board {
    let mut board = Board::new(BoardId::from("b"), "Sprint".into());
    for (column, cards) in [
        ("A", vec!["card1", "card2", "card3"]),
        ("B", vec!["card4", "card5"]),
        ("C", vec![]),
    ] {
        let column_id = ColumnId::from(column);
        board.add_column(column_id.clone(), column.into());
        for card in cards {
            board
                .insert_card(Card::new(CardId::from(card), column_id.clone(), card.into()))
                .unwrap();
        }
    }
    board
}

pub fn column_cards(board: &Board, column: &str) -> Vec<String> {
    board
        .column(&ColumnId::from(column))
        .unwrap()
        .cards
        .iter()
        .map(|c| c.id.to_string())
        .collect()
}

/// Server state kept row by row, the way a REST backend stores it
struct ServerState {
    board: Board,
    column_orders: BTreeMap<ColumnId, usize>,
    cards: BTreeMap<CardId, Card>,
}

/// In-memory backend with scripted failures and optional gates that hold
/// requests until opened
pub struct ScriptedBackend {
    state: Mutex<ServerState>,
    failures: Mutex<HashMap<String, BackendError>>,
    /// One-shot failures reported after the write was applied
    landed: Mutex<HashMap<String, BackendError>>,
    gate: Option<Semaphore>,
    fetch_gate: Option<Semaphore>,
    fetches_waiting: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(board: &Board) -> Self {
        let mut shell = board.clone();
        let mut column_orders = BTreeMap::new();
        let mut cards = BTreeMap::new();
        for column in board.columns.iter() {
            column_orders.insert(column.id.clone(), column.order);
            for card in column.cards.iter() {
                cards.insert(card.id.clone(), card.clone());
            }
        }
        shell.columns = OrderedCollection::from_items(
            board
                .columns
                .iter()
                .map(|c| Column::new(c.id.clone(), c.board_id.clone(), c.name.clone()))
                .collect(),
        );

        Self {
            state: Mutex::new(ServerState {
                board: shell,
                column_orders,
                cards,
            }),
            failures: Mutex::new(HashMap::new()),
            landed: Mutex::new(HashMap::new()),
            gate: None,
            fetch_gate: None,
            fetches_waiting: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(board: &Board) -> Self {
        let mut backend = Self::new(board);
        backend.gate = Some(Semaphore::new(0));
        backend
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }

    /// Holds board fetches only; row writes go through
    pub fn with_held_fetches(board: &Board) -> Self {
        let mut backend = Self::new(board);
        backend.fetch_gate = Some(Semaphore::new(0));
        backend
    }

    pub fn fetches_waiting(&self) -> usize {
        self.fetches_waiting.load(Ordering::SeqCst)
    }

    pub fn release_fetches(&self) {
        if let Some(gate) = &self.fetch_gate {
            gate.add_permits(1024);
        }
    }

    /// Every later request touching `id` fails with `error`
    pub fn fail(&self, id: &str, error: BackendError) {
        self.failures.lock().unwrap().insert(id.to_string(), error);
    }

    /// The next write to `id` is applied but reported as `error`, the way a
    /// request that timed out on the client can still reach the server
    pub fn land_then_fail(&self, id: &str, error: BackendError) {
        self.landed.lock().unwrap().insert(id.to_string(), error);
    }

    fn landed_result(&self, id: &str) -> Result<(), BackendError> {
        match self.landed.lock().unwrap().remove(id) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Changes a card's placement behind the client's back
    pub fn force_card(&self, id: &str, column: &str, order: usize) {
        let mut state = self.state.lock().unwrap();
        let card = state.cards.get_mut(&CardId::from(id)).unwrap();
        card.column_id = ColumnId::from(column);
        card.order = order;
    }

    pub fn server_board(&self) -> Board {
        let state = self.state.lock().unwrap();
        let columns = state
            .board
            .columns
            .iter()
            .map(|shell| {
                let mut column = shell.clone();
                column.order = state.column_orders[&shell.id];
                column.cards = OrderedCollection::from_items(
                    state
                        .cards
                        .values()
                        .filter(|card| card.column_id == shell.id)
                        .cloned()
                        .collect(),
                );
                column
            })
            .collect();

        let mut board = state.board.clone();
        board.columns = OrderedCollection::from_items(columns);
        board
    }

    async fn enter(&self, request: String, id: &str) -> Result<(), BackendError> {
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| BackendError::network("gate closed"))?;
        }
        self.log.lock().unwrap().push(request);
        match self.failures.lock().unwrap().get(id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BoardBackend for ScriptedBackend {
    async fn update_card(&self, update: &CardUpdate) -> Result<CardUpdate, BackendError> {
        self.enter(format!("PUT /cards/{}", update.card_id), update.card_id.as_str())
            .await?;
        let mut state = self.state.lock().unwrap();
        if !state.column_orders.contains_key(&update.column_id) {
            return Err(BackendError::validation(format!("unknown column {}", update.column_id)));
        }
        let card = state
            .cards
            .get_mut(&update.card_id)
            .ok_or_else(|| BackendError::validation(format!("unknown card {}", update.card_id)))?;
        card.column_id = update.column_id.clone();
        card.order = update.order;
        drop(state);
        self.landed_result(update.card_id.as_str())?;
        Ok(update.clone())
    }

    async fn update_column(&self, update: &ColumnUpdate) -> Result<ColumnUpdate, BackendError> {
        self.enter(format!("PUT /columns/{}", update.column_id), update.column_id.as_str())
            .await?;
        let mut state = self.state.lock().unwrap();
        let order = state
            .column_orders
            .get_mut(&update.column_id)
            .ok_or_else(|| BackendError::validation(format!("unknown column {}", update.column_id)))?;
        *order = update.order;
        drop(state);
        self.landed_result(update.column_id.as_str())?;
        Ok(update.clone())
    }

    async fn create_card(&self, card: &Card) -> Result<Card, BackendError> {
        self.enter(format!("POST /cards/{}", card.id), card.id.as_str())
            .await?;
        let mut state = self.state.lock().unwrap();
        state.cards.insert(card.id.clone(), card.clone());
        Ok(card.clone())
    }

    async fn delete_card(&self, id: &CardId) -> Result<(), BackendError> {
        self.enter(format!("DELETE /cards/{}", id), id.as_str()).await?;
        let mut state = self.state.lock().unwrap();
        state
            .cards
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::validation(format!("unknown card {}", id)))
    }

    async fn fetch_board(&self, id: &BoardId) -> Result<Board, BackendError> {
        if let Some(gate) = &self.fetch_gate {
            self.fetches_waiting.fetch_add(1, Ordering::SeqCst);
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| BackendError::network("fetch gate closed"))?;
        }
        self.enter(format!("GET /boards/{}", id), id.as_str()).await?;
        Ok(self.server_board())
    }
}

/// Records every notification it receives
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Result<usize, String>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Result<usize, String>> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> usize {
        self.events().iter().filter(|e| e.is_err()).count()
    }
}

impl Notifier for RecordingNotifier {
    fn succeeded(&self, changed: usize) {
        self.events.lock().unwrap().push(Ok(changed));
    }

    fn failed(&self, error: &ReorderError) {
        self.events.lock().unwrap().push(Err(error.to_string()));
    }
}
