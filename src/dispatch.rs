//! Fans a change out into independent row-level backend requests.

use crate::config::SyncConfig;
use crate::domain::{Board, BoardId, Card, CardId, CardUpdate, ColumnId, ColumnUpdate};
use crate::error::FailedUpdate;
use crate::storage::{BackendError, BackendErrorKind, BoardBackend};
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One request that did not succeed
#[derive(Debug, Clone, PartialEq)]
pub struct FailedMutation<K> {
    pub key: K,
    pub error: BackendError,
}

/// Result of dispatching a batch: every request is accounted for
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport<K> {
    pub succeeded: Vec<K>,
    pub failed: Vec<FailedMutation<K>>,
}

impl<K> DispatchReport<K> {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Keys whose write may be on the server: every success plus every
    /// network failure, since a timed-out request can still land later
    pub fn possibly_applied(&self) -> impl Iterator<Item = &K> {
        let uncertain = self
            .failed
            .iter()
            .filter(|f| f.error.kind == BackendErrorKind::Network)
            .map(|f| &f.key);
        self.succeeded.iter().chain(uncertain)
    }

    fn from_results(results: Vec<(K, Result<(), BackendError>)>) -> Self {
        let mut report = Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for (key, result) in results {
            match result {
                Ok(()) => report.succeeded.push(key),
                Err(error) => report.failed.push(FailedMutation { key, error }),
            }
        }
        report
    }
}

impl<K: fmt::Display> DispatchReport<K> {
    /// Failures keyed by entity id, for error reporting
    pub fn failures(&self) -> Vec<FailedUpdate> {
        self.failed
            .iter()
            .map(|f| FailedUpdate {
                id: f.key.to_string(),
                error: f.error.clone(),
            })
            .collect()
    }
}

/// Issues one request per update, all in flight at once, with no
/// ordering between them and no batching
#[derive(Clone)]
pub struct MutationDispatcher {
    backend: Arc<dyn BoardBackend>,
    timeout: Option<Duration>,
}

impl MutationDispatcher {
    pub fn new(backend: Arc<dyn BoardBackend>, timeout: Option<Duration>) -> Self {
        Self { backend, timeout }
    }

    pub fn from_config(backend: Arc<dyn BoardBackend>, config: &SyncConfig) -> Self {
        Self::new(backend, config.request_timeout())
    }

    pub async fn dispatch_cards(&self, updates: &[CardUpdate]) -> DispatchReport<CardId> {
        let requests = updates.iter().map(|update| async move {
            let result = self.send(self.backend.update_card(update)).await;
            log_result("card", &update.card_id, &result);
            (update.card_id.clone(), result.map(|_| ()))
        });
        DispatchReport::from_results(join_all(requests).await)
    }

    pub async fn dispatch_columns(&self, updates: &[ColumnUpdate]) -> DispatchReport<ColumnId> {
        let requests = updates.iter().map(|update| async move {
            let result = self.send(self.backend.update_column(update)).await;
            log_result("column", &update.column_id, &result);
            (update.column_id.clone(), result.map(|_| ()))
        });
        DispatchReport::from_results(join_all(requests).await)
    }

    pub async fn create_card(&self, card: &Card) -> Result<Card, BackendError> {
        let result = self.send(self.backend.create_card(card)).await;
        log_result("card", &card.id, &result);
        result
    }

    pub async fn delete_card(&self, id: &CardId) -> Result<(), BackendError> {
        let result = self.send(self.backend.delete_card(id)).await;
        log_result("card", id, &result);
        result
    }

    pub async fn fetch_board(&self, id: &BoardId) -> Result<Board, BackendError> {
        self.send(self.backend.fetch_board(id)).await
    }

    async fn send<T>(
        &self,
        request: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.unwrap_or_else(|_| {
                Err(BackendError::network(format!(
                    "request timed out after {}ms",
                    limit.as_millis()
                )))
            }),
            None => request.await,
        }
    }
}

fn log_result<T>(entity: &str, id: &impl fmt::Display, result: &Result<T, BackendError>) {
    match result {
        Ok(_) => tracing::debug!(entity, id = %id, "backend accepted update"),
        Err(e) => tracing::warn!(entity, id = %id, error = %e, "backend rejected update"),
    }
}
