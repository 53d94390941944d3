mod common;

use common::{column_cards, sample_board};
use kanban_reorder::{
    Board, BoardId, BoardSync, ColumnId, ConsistencyCheck, DragKind, DropEvent, DropLocation,
    DropOutcome, FileBackend, OptimisticCache, ReorderError, SyncConfig,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn seeded(board: &Board) -> (TempDir, Arc<FileBackend>) {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path());
    backend.save_board(board).await.unwrap();
    (dir, Arc::new(backend))
}

#[tokio::test]
async fn test_drop_persists_to_disk() {
    let (_dir, backend) = seeded(&sample_board()).await;
    let cache = OptimisticCache::new(sample_board()).unwrap().into_shared();
    let sync = BoardSync::new(cache, backend.clone(), SyncConfig::default());

    sync.begin_drag("card3", DragKind::Card).await.unwrap();
    let outcome = sync
        .complete_drop(DropEvent::card(
            "card3",
            DropLocation::new("A", 2),
            Some(DropLocation::new("C", 0)),
        ))
        .await
        .unwrap();
    assert_eq!(outcome, DropOutcome::Committed { updated: 1 });

    let stored = backend.load_board(&BoardId::from("b")).await.unwrap();
    assert_eq!(column_cards(&stored, "A"), vec!["card1", "card2"]);
    assert_eq!(column_cards(&stored, "C"), vec!["card3"]);
    assert_eq!(stored.placement(), sync.cache().read().await.board().placement());
}

#[tokio::test]
async fn test_unknown_server_column_rolls_back() {
    // The server only knows columns A and B
    let mut server = Board::new(BoardId::from("b"), "Sprint".into());
    let full = sample_board();
    for id in ["A", "B"] {
        let column = full.column(&ColumnId::from(id)).unwrap();
        server.add_column(column.id.clone(), column.name.clone());
        for card in column.cards.iter() {
            server.insert_card(card.clone()).unwrap();
        }
    }
    let (_dir, backend) = seeded(&server).await;

    let cache = OptimisticCache::new(full).unwrap().into_shared();
    let before = cache.read().await.board().clone();
    let sync = BoardSync::new(cache, backend.clone(), SyncConfig::default());

    sync.begin_drag("card1", DragKind::Card).await.unwrap();
    let err = sync
        .complete_drop(DropEvent::card(
            "card1",
            DropLocation::new("A", 0),
            Some(DropLocation::new("C", 0)),
        ))
        .await
        .unwrap_err();

    match err {
        ReorderError::RolledBack { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, "card1");
            assert!(!failures[0].error.is_retriable());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sync.cache().read().await.board(), &before);

    let check = sync.verify().await.unwrap();
    assert!(matches!(
        check,
        ConsistencyCheck::Resynced {
            columns_changed: true,
            ..
        }
    ));
    let cache = sync.cache();
    let cache = cache.read().await;
    assert!(cache.board().column(&ColumnId::from("C")).is_none());
    assert!(cache.board().validate().is_ok());
}

#[tokio::test]
async fn test_add_and_delete_card_on_disk() {
    let (_dir, backend) = seeded(&sample_board()).await;
    let cache = OptimisticCache::new(sample_board()).unwrap().into_shared();
    let sync = BoardSync::new(cache, backend.clone(), SyncConfig::default());

    let card = sync.add_card(&ColumnId::from("B"), "Review").await.unwrap();
    assert_eq!(card.order, 2);

    sync.delete_card(&"card4".into()).await.unwrap();

    let stored = backend.load_board(&BoardId::from("b")).await.unwrap();
    assert_eq!(
        column_cards(&stored, "B"),
        vec!["card5".to_string(), card.id.to_string()]
    );
    assert!(stored.card(&"card4".into()).is_none());
    assert_eq!(sync.verify().await.unwrap(), ConsistencyCheck::Consistent);
}
