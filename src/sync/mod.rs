//! Drag lifecycle controller: snapshot, reconcile, apply, dispatch, then
//! commit or roll back.
//!
//! One change is in flight at a time. The controller walks
//! [`DragPhase`] from `Idle` back to `Idle` for every gesture, and refuses
//! new gestures until the previous one has settled.

pub mod notify;
pub mod phase;

pub use notify::{NoopNotifier, Notifier};
pub use phase::DragPhase;

use crate::{
    cache::{OptimisticCache, SharedCache, Snapshot},
    config::{RollbackPolicy, SyncConfig},
    dispatch::MutationDispatcher,
    domain::{BoardId, Card, CardId, CardUpdate, ColumnId, ColumnUpdate},
    error::{FailedUpdate, ReorderError, Result},
    reconcile::{reconcile, reconcile_columns, DragKind, DropEvent},
    storage::BoardBackend,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Fetches `verify` makes before giving up on a cache that keeps changing
const VERIFY_ATTEMPTS: usize = 3;

/// How a drop finished when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released outside any container
    Cancelled,
    /// Dropped where it started; nothing was sent
    Unchanged,
    /// Every request succeeded
    Committed { updated: usize },
}

/// Result of comparing the cache with a fresh fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyCheck {
    Consistent,
    /// The server disagreed; its state replaced the cache
    Resynced {
        cards: Vec<CardId>,
        columns_changed: bool,
    },
}

struct ActiveDrag {
    draggable_id: String,
    kind: DragKind,
    snapshot: Snapshot,
}

struct Session {
    phase: DragPhase,
    active: Option<ActiveDrag>,
}

impl Session {
    fn transition(&mut self, to: DragPhase) -> Result<()> {
        if !self.phase.can_transition_to(&to) {
            return Err(ReorderError::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
            });
        }
        tracing::debug!(from = %self.phase, to = %to, "drag phase");
        self.phase = to;
        Ok(())
    }
}

enum Staged {
    Cancelled,
    Unchanged,
    Cards(Vec<CardUpdate>, Vec<Snapshot>),
    Columns(Vec<ColumnUpdate>, Snapshot),
}

/// Writes that undo requests which landed, or may have landed, before the
/// change was rolled back
#[derive(Debug, Default)]
struct Compensation {
    recreate: Option<Card>,
    cards: Vec<CardUpdate>,
    columns: Vec<ColumnUpdate>,
}

/// Keeps a board's optimistic cache in step with a row-level backend
pub struct BoardSync {
    cache: SharedCache,
    dispatcher: MutationDispatcher,
    notifier: Arc<dyn Notifier>,
    config: SyncConfig,
    session: Mutex<Session>,
}

impl BoardSync {
    pub fn new(cache: SharedCache, backend: Arc<dyn BoardBackend>, config: SyncConfig) -> Self {
        Self {
            cache,
            dispatcher: MutationDispatcher::from_config(backend, &config),
            notifier: Arc::new(NoopNotifier),
            config,
            session: Mutex::new(Session {
                phase: DragPhase::Idle,
                active: None,
            }),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Handle for readers of the optimistic state
    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn phase(&self) -> DragPhase {
        self.session.lock().await.phase
    }

    /// Starts a gesture and snapshots the dragged item's scope: the source
    /// column for cards, the whole column list for columns
    pub async fn begin_drag(&self, draggable_id: impl Into<String>, kind: DragKind) -> Result<()> {
        let draggable_id = draggable_id.into();
        let mut session = self.session.lock().await;
        if !session.phase.is_idle() {
            return Err(ReorderError::DragInProgress {
                phase: session.phase.to_string(),
            });
        }

        let snapshot = {
            let cache = self.cache.read().await;
            match kind {
                DragKind::Card => {
                    let card_id = CardId::from(draggable_id.as_str());
                    let (column_id, _) = cache
                        .board()
                        .locate_card(&card_id)
                        .ok_or_else(|| ReorderError::CardNotFound(card_id.to_string()))?;
                    cache.snapshot(&[column_id])?
                }
                DragKind::Column => {
                    let column_id = ColumnId::from(draggable_id.as_str());
                    if cache.board().column(&column_id).is_none() {
                        return Err(ReorderError::ColumnNotFound(column_id.to_string()));
                    }
                    cache.snapshot_board()
                }
            }
        };

        session.transition(DragPhase::Dragging)?;
        tracing::debug!(draggable = %draggable_id, kind = %kind, "drag started");
        session.active = Some(ActiveDrag {
            draggable_id,
            kind,
            snapshot,
        });
        Ok(())
    }

    /// Abandons the current gesture without touching anything
    pub async fn cancel_drag(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.phase != DragPhase::Dragging {
            return Err(ReorderError::NoActiveDrag);
        }
        session.transition(DragPhase::Idle)?;
        session.active = None;
        Ok(())
    }

    /// Finishes the current gesture.
    ///
    /// Reconciliation and the cache write happen under one write lock. The
    /// backend requests then run with no lock held. If any request fails,
    /// every column the drop touched is restored and a single
    /// [`ReorderError::RolledBack`] is returned.
    pub async fn complete_drop(&self, event: DropEvent) -> Result<DropOutcome> {
        let active = {
            let mut session = self.session.lock().await;
            if session.phase != DragPhase::Dragging {
                return Err(ReorderError::NoActiveDrag);
            }
            session.transition(DragPhase::Reconciling)?;
            session.active.take()
        };
        let Some(active) = active else {
            return Err(self.reject(ReorderError::NoActiveDrag).await);
        };

        if active.draggable_id != event.draggable_id || active.kind != event.kind {
            let error = ReorderError::InvalidDrop(format!(
                "drop of {} {} does not match dragged {} {}",
                event.kind, event.draggable_id, active.kind, active.draggable_id
            ));
            return Err(self.reject(error).await);
        }

        let staged = {
            let mut cache = self.cache.write().await;
            stage_drop(&mut cache, &event, active.snapshot)
        };

        match staged {
            Ok(Staged::Cancelled) => {
                self.settle(DragPhase::Committed).await;
                Ok(DropOutcome::Cancelled)
            }
            Ok(Staged::Unchanged) => {
                self.settle(DragPhase::Committed).await;
                Ok(DropOutcome::Unchanged)
            }
            Ok(Staged::Cards(updates, snapshots)) => self.commit_cards(updates, snapshots).await,
            Ok(Staged::Columns(updates, snapshot)) => self.commit_columns(updates, snapshot).await,
            Err(error) => Err(self.reject(error).await),
        }
    }

    /// Appends a card to a column, optimistically
    pub async fn add_card(&self, column_id: &ColumnId, title: impl Into<String>) -> Result<Card> {
        self.start_edit().await?;

        let staged = {
            let mut cache = self.cache.write().await;
            stage_insert(&mut cache, column_id, title.into())
        };
        let (card, snapshot) = match staged {
            Ok(staged) => staged,
            Err(error) => return Err(self.reject(error).await),
        };

        self.set_phase(DragPhase::Committing).await?;
        match self.dispatcher.create_card(&card).await {
            Ok(_) => {
                self.committed(1).await;
                Ok(card)
            }
            Err(error) => {
                let error = ReorderError::RolledBack {
                    attempted: 1,
                    failures: vec![FailedUpdate {
                        id: card.id.to_string(),
                        error,
                    }],
                };
                Err(self.rollback(&[snapshot], Compensation::default(), error).await)
            }
        }
    }

    /// Deletes a card and closes the gap behind it, optimistically
    pub async fn delete_card(&self, id: &CardId) -> Result<()> {
        self.start_edit().await?;

        let staged = {
            let mut cache = self.cache.write().await;
            stage_delete(&mut cache, id)
        };
        let (removed, shifted, snapshot) = match staged {
            Ok(staged) => staged,
            Err(error) => return Err(self.reject(error).await),
        };

        self.set_phase(DragPhase::Committing).await?;
        let (deleted, report) = futures::join!(
            self.dispatcher.delete_card(id),
            self.dispatcher.dispatch_cards(&shifted)
        );

        let attempted = 1 + shifted.len();
        let mut failures = report.failures();
        let mut compensation = Compensation::default();
        match deleted {
            Ok(()) => compensation.recreate = Some(removed),
            Err(error) => failures.insert(
                0,
                FailedUpdate {
                    id: id.to_string(),
                    error,
                },
            ),
        }

        if failures.is_empty() {
            self.committed(attempted).await;
            return Ok(());
        }

        compensation.cards = report
            .possibly_applied()
            .filter_map(|card_id| snapshot.card_placement(card_id))
            .collect();
        let error = ReorderError::RolledBack {
            attempted,
            failures,
        };
        Err(self.rollback(&[snapshot], compensation, error).await)
    }

    /// Refetches the board and compares placements with the cache.
    ///
    /// On divergence the server state wins and replaces the cache. A fetch
    /// that started before the cache last changed is discarded and retried,
    /// so a change committed during the fetch is never undone.
    pub async fn verify(&self) -> Result<ConsistencyCheck> {
        for _ in 0..VERIFY_ATTEMPTS {
            self.ensure_idle().await?;
            let (board_id, fetched_at) = {
                let cache = self.cache.read().await;
                (cache.board().id.clone(), cache.version())
            };
            let server = self.dispatcher.fetch_board(&board_id).await?;

            let session = self.session.lock().await;
            if !session.phase.is_idle() {
                return Err(ReorderError::DragInProgress {
                    phase: session.phase.to_string(),
                });
            }

            let mut cache = self.cache.write().await;
            if cache.version() != fetched_at {
                tracing::debug!(
                    board = %board_id,
                    fetched_at,
                    current = cache.version(),
                    "cache changed during fetch, refetching"
                );
                continue;
            }

            let local = cache.board().placement();
            let remote = server.placement();
            if local == remote {
                return Ok(ConsistencyCheck::Consistent);
            }

            let cards = local.diverging_cards(&remote);
            let columns_changed = local.columns != remote.columns;
            tracing::warn!(
                board = %board_id,
                cards = cards.len(),
                columns_changed,
                "local order diverged from server, resyncing"
            );
            cache.replace(server)?;
            return Ok(ConsistencyCheck::Resynced {
                cards,
                columns_changed,
            });
        }

        let cache = self.cache.read().await;
        Err(ReorderError::StaleFetch {
            board: cache.board().id.to_string(),
            attempts: VERIFY_ATTEMPTS,
        })
    }

    async fn commit_cards(
        &self,
        updates: Vec<CardUpdate>,
        snapshots: Vec<Snapshot>,
    ) -> Result<DropOutcome> {
        self.set_phase(DragPhase::Committing).await?;
        let report = self.dispatcher.dispatch_cards(&updates).await;

        if report.is_success() {
            self.committed(updates.len()).await;
            return Ok(DropOutcome::Committed {
                updated: updates.len(),
            });
        }

        let compensation = Compensation {
            cards: report
                .possibly_applied()
                .filter_map(|id| snapshots.iter().find_map(|s| s.card_placement(id)))
                .collect(),
            ..Compensation::default()
        };
        let error = ReorderError::RolledBack {
            attempted: report.attempted(),
            failures: report.failures(),
        };
        Err(self.rollback(&snapshots, compensation, error).await)
    }

    async fn commit_columns(
        &self,
        updates: Vec<ColumnUpdate>,
        snapshot: Snapshot,
    ) -> Result<DropOutcome> {
        self.set_phase(DragPhase::Committing).await?;
        let report = self.dispatcher.dispatch_columns(&updates).await;

        if report.is_success() {
            self.committed(updates.len()).await;
            return Ok(DropOutcome::Committed {
                updated: updates.len(),
            });
        }

        let compensation = Compensation {
            columns: report
                .possibly_applied()
                .filter_map(|id| snapshot.column_placement(id))
                .collect(),
            ..Compensation::default()
        };
        let error = ReorderError::RolledBack {
            attempted: report.attempted(),
            failures: report.failures(),
        };
        Err(self.rollback(&[snapshot], compensation, error).await)
    }

    async fn committed(&self, changed: usize) {
        self.settle(DragPhase::Committed).await;
        tracing::info!(changed, "change committed");
        self.notifier.succeeded(changed);

        if self.config.verify_after_commit {
            match self.verify().await {
                Ok(ConsistencyCheck::Consistent) => {}
                Ok(ConsistencyCheck::Resynced { cards, .. }) => {
                    tracing::warn!(cards = cards.len(), "server disagreed after commit")
                }
                Err(e) => tracing::warn!(error = %e, "post-commit verification failed"),
            }
        }
    }

    async fn rollback(
        &self,
        snapshots: &[Snapshot],
        compensation: Compensation,
        error: ReorderError,
    ) -> ReorderError {
        let restored = self.cache.write().await.restore(snapshots);
        if let Err(e) = &restored {
            tracing::error!(error = %e, "could not restore snapshot");
        }

        if self.config.rollback == RollbackPolicy::Compensate {
            self.compensate(compensation).await;
        }
        // A failed restore leaves the cache untrusted; the server copy wins.
        if self.config.rollback == RollbackPolicy::Refetch || restored.is_err() {
            if let Some(snapshot) = snapshots.first() {
                self.refetch(snapshot.board_id()).await;
            }
        }

        self.settle(DragPhase::RolledBack).await;
        tracing::warn!(error = %error, "change rolled back");
        self.notifier.failed(&error);
        error
    }

    async fn compensate(&self, compensation: Compensation) {
        if let Some(card) = &compensation.recreate {
            if let Err(e) = self.dispatcher.create_card(card).await {
                tracing::warn!(card = %card.id, error = %e, "could not recreate deleted card");
            }
        }
        let (cards, columns) = futures::join!(
            self.dispatcher.dispatch_cards(&compensation.cards),
            self.dispatcher.dispatch_columns(&compensation.columns)
        );
        if !cards.is_success() || !columns.is_success() {
            tracing::warn!(
                cards = cards.failed.len(),
                columns = columns.failed.len(),
                "compensating writes failed"
            );
        }
    }

    async fn refetch(&self, board_id: &BoardId) {
        match self.dispatcher.fetch_board(board_id).await {
            Ok(board) => {
                if let Err(e) = self.cache.write().await.replace(board) {
                    tracing::warn!(board = %board_id, error = %e, "refetched board rejected");
                }
            }
            Err(e) => tracing::warn!(board = %board_id, error = %e, "refetch failed"),
        }
    }

    /// Enters `Reconciling` directly for non-gesture edits
    async fn start_edit(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.phase.is_idle() {
            return Err(ReorderError::DragInProgress {
                phase: session.phase.to_string(),
            });
        }
        session.transition(DragPhase::Reconciling)
    }

    async fn ensure_idle(&self) -> Result<()> {
        let session = self.session.lock().await;
        if session.phase.is_idle() {
            Ok(())
        } else {
            Err(ReorderError::DragInProgress {
                phase: session.phase.to_string(),
            })
        }
    }

    async fn set_phase(&self, phase: DragPhase) -> Result<()> {
        self.session.lock().await.transition(phase)
    }

    /// Moves through a terminal phase back to `Idle`
    async fn settle(&self, terminal: DragPhase) {
        let mut session = self.session.lock().await;
        for phase in [terminal, DragPhase::Idle] {
            if let Err(e) = session.transition(phase) {
                tracing::error!(error = %e, "forcing drag phase back to Idle");
                session.phase = DragPhase::Idle;
                break;
            }
        }
        session.active = None;
    }

    /// Abandons a change that failed before anything was dispatched
    async fn reject(&self, error: ReorderError) -> ReorderError {
        {
            let mut session = self.session.lock().await;
            if let Err(e) = session.transition(DragPhase::Idle) {
                tracing::error!(error = %e, "forcing drag phase back to Idle");
                session.phase = DragPhase::Idle;
            }
            session.active = None;
        }
        tracing::warn!(error = %error, "change rejected before dispatch");
        self.notifier.failed(&error);
        error
    }
}

fn stage_drop(cache: &mut OptimisticCache, event: &DropEvent, source: Snapshot) -> Result<Staged> {
    match event.kind {
        DragKind::Card => {
            let Some(mv) = event.card_move()? else {
                return Ok(Staged::Cancelled);
            };
            let updates = reconcile(&mv, cache.board())?;
            if updates.is_empty() {
                return Ok(Staged::Unchanged);
            }

            let mut snapshots = Vec::with_capacity(2);
            if source.version() == cache.version() && source.covers(&mv.source_column) {
                snapshots.push(source);
                if mv.is_cross_column() {
                    snapshots.push(cache.snapshot(&[mv.dest_column.clone()])?);
                }
            } else {
                snapshots.push(cache.snapshot(&[mv.source_column.clone(), mv.dest_column.clone()])?);
            }

            cache.apply(&updates)?;
            Ok(Staged::Cards(updates, snapshots))
        }
        DragKind::Column => {
            let Some(mv) = event.column_move()? else {
                return Ok(Staged::Cancelled);
            };
            let updates = reconcile_columns(&mv, cache.board())?;
            if updates.is_empty() {
                return Ok(Staged::Unchanged);
            }

            let snapshot = if source.version() == cache.version() {
                source
            } else {
                cache.snapshot_board()
            };
            cache.apply_columns(&updates)?;
            Ok(Staged::Columns(updates, snapshot))
        }
    }
}

fn stage_insert(
    cache: &mut OptimisticCache,
    column_id: &ColumnId,
    title: String,
) -> Result<(Card, Snapshot)> {
    let snapshot = cache.snapshot(std::slice::from_ref(column_id))?;
    let card = cache.insert_card(Card::new(CardId::generate(), column_id.clone(), title))?;
    Ok((card, snapshot))
}

fn stage_delete(
    cache: &mut OptimisticCache,
    id: &CardId,
) -> Result<(Card, Vec<CardUpdate>, Snapshot)> {
    let (column_id, _) = cache
        .board()
        .locate_card(id)
        .ok_or_else(|| ReorderError::CardNotFound(id.to_string()))?;
    let snapshot = cache.snapshot(&[column_id])?;
    let (removed, shifted) = cache.remove_card(id)?;
    Ok((removed, shifted, snapshot))
}
