use crate::{
    domain::{Board, BoardId, Card, CardId, CardUpdate, Column, ColumnId, ColumnUpdate, OrderedCollection},
    error::{ReorderError, Result},
    storage::{BackendError, BoardBackend},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

/// Column metadata as persisted in a board file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnRecord {
    id: ColumnId,
    name: String,
    order: usize,
}

/// Board file contents; cards live in their own files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoardRecord {
    id: BoardId,
    name: String,
    #[serde(default)]
    archived: bool,
    columns: Vec<ColumnRecord>,
}

impl BoardRecord {
    fn has_column(&self, id: &ColumnId) -> bool {
        self.columns.iter().any(|c| &c.id == id)
    }
}

/// File-based backend: one JSON file per board and one per card.
///
/// Each request reads and writes a single row, matching the per-entity
/// contract of a remote API.
pub struct FileBackend {
    root_path: PathBuf,
    board_lock: Mutex<()>,
}

impl FileBackend {
    const DATA_DIR: &'static str = ".kanban";
    const BOARDS_DIR: &'static str = "boards";
    const CARDS_DIR: &'static str = "cards";

    /// Creates a new FileBackend for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::DATA_DIR),
            board_lock: Mutex::new(()),
        }
    }

    fn boards_dir(&self) -> PathBuf {
        self.root_path.join(Self::BOARDS_DIR)
    }

    fn cards_dir(&self) -> PathBuf {
        self.root_path.join(Self::CARDS_DIR)
    }

    fn board_file(&self, id: &BoardId) -> PathBuf {
        self.boards_dir().join(format!("{}.json", id.as_str()))
    }

    fn card_file(&self, id: &CardId) -> PathBuf {
        self.cards_dir().join(format!("{}.json", id.as_str()))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    /// Creates the directory structure
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.boards_dir()).await?;
        self.ensure_directory_exists(&self.cards_dir()).await?;
        Ok(())
    }

    /// Checks if the data directory exists
    pub async fn is_initialized(&self) -> bool {
        self.boards_dir().exists() && self.cards_dir().exists()
    }

    /// Persists a whole board, including every card
    pub async fn save_board(&self, board: &Board) -> Result<()> {
        board.validate()?;
        self.initialize().await?;

        let record = BoardRecord {
            id: board.id.clone(),
            name: board.name.clone(),
            archived: board.archived,
            columns: board
                .columns
                .iter()
                .map(|c| ColumnRecord {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    order: c.order,
                })
                .collect(),
        };
        {
            let _guard = self.board_lock.lock().await;
            write_json(&self.board_file(&board.id), &record).await?;
        }

        for column in &board.columns {
            for card in &column.cards {
                write_json(&self.card_file(&card.id), card).await?;
            }
        }
        Ok(())
    }

    /// Loads a board and all its cards.
    ///
    /// Orders read from disk are normalized into dense sequences.
    pub async fn load_board(&self, id: &BoardId) -> Result<Board> {
        let path = self.board_file(id);
        if !path.exists() {
            return Err(ReorderError::BoardNotFound(id.to_string()));
        }
        let record: BoardRecord = read_json(&path).await?;
        let cards = self.list_cards().await?;

        let columns = record
            .columns
            .iter()
            .map(|c| {
                let column_cards = cards
                    .iter()
                    .filter(|card| card.column_id == c.id)
                    .cloned()
                    .collect();
                Column {
                    id: c.id.clone(),
                    board_id: record.id.clone(),
                    name: c.name.clone(),
                    order: c.order,
                    cards: OrderedCollection::from_items(column_cards),
                }
            })
            .collect();

        Ok(Board {
            id: record.id,
            name: record.name,
            archived: record.archived,
            columns: OrderedCollection::from_items(columns),
        })
    }

    async fn list_cards(&self) -> Result<Vec<Card>> {
        let dir = self.cards_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut cards = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                cards.push(read_json::<Card>(&path).await?);
            }
        }
        Ok(cards)
    }

    async fn list_board_records(&self) -> Result<Vec<BoardRecord>> {
        let dir = self.boards_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                records.push(read_json::<BoardRecord>(&path).await?);
            }
        }
        Ok(records)
    }

    async fn column_exists(&self, id: &ColumnId) -> Result<bool> {
        Ok(self
            .list_board_records()
            .await?
            .iter()
            .any(|record| record.has_column(id)))
    }

    async fn read_card(&self, id: &CardId) -> std::result::Result<Card, BackendError> {
        let path = self.card_file(id);
        if !path.exists() {
            return Err(BackendError::validation(format!("unknown card {}", id)));
        }
        read_json(&path).await.map_err(to_backend_error)
    }
}

#[async_trait]
impl BoardBackend for FileBackend {
    async fn update_card(&self, update: &CardUpdate) -> std::result::Result<CardUpdate, BackendError> {
        let mut card = self.read_card(&update.card_id).await?;
        if !self
            .column_exists(&update.column_id)
            .await
            .map_err(to_backend_error)?
        {
            return Err(BackendError::validation(format!(
                "unknown column {}",
                update.column_id
            )));
        }

        card.place(update.column_id.clone(), update.order);
        write_json(&self.card_file(&card.id), &card)
            .await
            .map_err(to_backend_error)?;

        Ok(CardUpdate::new(card.id, card.column_id, card.order))
    }

    async fn update_column(&self, update: &ColumnUpdate) -> std::result::Result<ColumnUpdate, BackendError> {
        let _guard = self.board_lock.lock().await;

        let path = self.board_file(&update.board_id);
        if !path.exists() {
            return Err(BackendError::validation(format!(
                "unknown board {}",
                update.board_id
            )));
        }
        let mut record: BoardRecord = read_json(&path).await.map_err(to_backend_error)?;
        let column = record
            .columns
            .iter_mut()
            .find(|c| c.id == update.column_id)
            .ok_or_else(|| BackendError::validation(format!("unknown column {}", update.column_id)))?;
        column.order = update.order;

        write_json(&path, &record).await.map_err(to_backend_error)?;
        Ok(update.clone())
    }

    async fn create_card(&self, card: &Card) -> std::result::Result<Card, BackendError> {
        if self.card_file(&card.id).exists() {
            return Err(BackendError::validation(format!("card {} already exists", card.id)));
        }
        if !self
            .column_exists(&card.column_id)
            .await
            .map_err(to_backend_error)?
        {
            return Err(BackendError::validation(format!(
                "unknown column {}",
                card.column_id
            )));
        }

        write_json(&self.card_file(&card.id), card)
            .await
            .map_err(to_backend_error)?;
        Ok(card.clone())
    }

    async fn delete_card(&self, id: &CardId) -> std::result::Result<(), BackendError> {
        let path = self.card_file(id);
        if !path.exists() {
            return Err(BackendError::validation(format!("unknown card {}", id)));
        }
        fs::remove_file(path)
            .await
            .map_err(|e| BackendError::network(e.to_string()))
    }

    async fn fetch_board(&self, id: &BoardId) -> std::result::Result<Board, BackendError> {
        self.load_board(id).await.map_err(to_backend_error)
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).await?;
    Ok(())
}

fn to_backend_error(err: ReorderError) -> BackendError {
    match err {
        ReorderError::IoError(e) => BackendError::network(e.to_string()),
        other => BackendError::validation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_board() -> Board {
        let mut board = Board::new(BoardId::from("b1"), "Sprint".into());
        board.add_column(ColumnId::from("todo"), "To Do".into());
        board.add_column(ColumnId::from("done"), "Done".into());
        for title in ["one", "two"] {
            board
                .insert_card(Card::new(CardId::from(title), ColumnId::from("todo"), title.into()))
                .unwrap();
        }
        board
    }

    async fn seeded() -> (TempDir, FileBackend) {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path());
        backend.save_board(&sample_board()).await.unwrap();
        (temp_dir, backend)
    }

    #[tokio::test]
    async fn test_backend_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path());

        assert!(!backend.is_initialized().await);
        backend.initialize().await.unwrap();
        assert!(backend.is_initialized().await);
    }

    #[tokio::test]
    async fn test_board_save_and_fetch() {
        let (_temp, backend) = seeded().await;

        let fetched = backend.fetch_board(&BoardId::from("b1")).await.unwrap();
        assert_eq!(fetched.placement(), sample_board().placement());
        assert!(fetched.validate().is_ok());
    }

    #[tokio::test]
    async fn test_fetch_unknown_board() {
        let (_temp, backend) = seeded().await;
        let err = backend.fetch_board(&BoardId::from("nope")).await.unwrap_err();
        assert_eq!(err.kind, crate::storage::BackendErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_update_card_moves_between_columns() {
        let (_temp, backend) = seeded().await;

        let stored = backend
            .update_card(&CardUpdate::new(CardId::from("one"), ColumnId::from("done"), 0))
            .await
            .unwrap();
        assert_eq!(stored.column_id.as_str(), "done");

        backend
            .update_card(&CardUpdate::new(CardId::from("two"), ColumnId::from("todo"), 0))
            .await
            .unwrap();

        let board = backend.fetch_board(&BoardId::from("b1")).await.unwrap();
        assert_eq!(board.locate_card(&CardId::from("one")), Some((ColumnId::from("done"), 0)));
        assert_eq!(board.locate_card(&CardId::from("two")), Some((ColumnId::from("todo"), 0)));
    }

    #[tokio::test]
    async fn test_update_card_rejects_unknown_column() {
        let (_temp, backend) = seeded().await;

        let err = backend
            .update_card(&CardUpdate::new(CardId::from("one"), ColumnId::from("ghost"), 0))
            .await
            .unwrap_err();
        assert!(!err.is_retriable());
        assert!(err.message.contains("ghost"));
    }

    #[tokio::test]
    async fn test_update_column_order() {
        let (_temp, backend) = seeded().await;
        let b1 = BoardId::from("b1");

        backend
            .update_column(&ColumnUpdate::new(ColumnId::from("done"), b1.clone(), 0))
            .await
            .unwrap();
        backend
            .update_column(&ColumnUpdate::new(ColumnId::from("todo"), b1.clone(), 1))
            .await
            .unwrap();

        let board = backend.fetch_board(&b1).await.unwrap();
        assert_eq!(board.column_at(0).unwrap().id.as_str(), "done");
    }

    #[tokio::test]
    async fn test_create_and_delete_card() {
        let (_temp, backend) = seeded().await;

        let mut card = Card::new(CardId::from("three"), ColumnId::from("done"), "three".into());
        card.order = 0;
        backend.create_card(&card).await.unwrap();
        assert!(backend.create_card(&card).await.is_err());

        backend.delete_card(&card.id).await.unwrap();
        assert!(backend.delete_card(&card.id).await.is_err());
    }
}
