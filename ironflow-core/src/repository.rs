//! Abstract, out-of-scope persistence sink.
//!
//! The time-series store (QuestDB schema: `market_data`, `trades`,
//! `orderbook_snapshots`, `indicators`, `strategies`, `sessions`, `orders`, `positions`,
//! `signals`, `state_transitions`) is an external collaborator. Every component that would
//! write to one of those tables instead writes through a [`Repository`] trait object; this
//! crate never implements one against a real database. Writes are best-effort and
//! at-least-once: implementors must tolerate duplicate `(ts, key)` pairs on read.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RepositoryError {
    #[error("not_found")]
    NotFound,
    #[error("write rejected: {0}")]
    WriteRejected(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A best-effort, at-least-once append/query sink for one of the platform's time-series
/// tables. `Key` is whatever the table's natural key is (e.g. `(Timestamp, Symbol,
/// VariantId)` for `indicators`).
#[async_trait]
pub trait Repository<Row, Key>: Send + Sync {
    async fn append(&self, row: Row) -> Result<(), RepositoryError>;

    async fn query_latest(&self, key: &Key, n: usize) -> Result<Vec<Row>, RepositoryError>;
}

/// Reference in-memory implementation used by tests and by components that have no
/// durable backing configured. Not suitable for production use — it never evicts.
#[derive(Debug, Default)]
pub struct InMemoryRepository<Row> {
    rows: std::sync::RwLock<Vec<Row>>,
}

impl<Row: Clone + Send + Sync> InMemoryRepository<Row> {
    pub fn new() -> Self {
        Self {
            rows: std::sync::RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl<Row, Key> Repository<Row, Key> for InMemoryRepository<Row>
where
    Row: Clone + Send + Sync,
    Key: Send + Sync,
{
    async fn append(&self, row: Row) -> Result<(), RepositoryError> {
        self.rows
            .write()
            .map_err(|_| RepositoryError::Unavailable("poisoned lock".into()))?
            .push(row);
        Ok(())
    }

    async fn query_latest(&self, _key: &Key, n: usize) -> Result<Vec<Row>, RepositoryError> {
        let guard = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Unavailable("poisoned lock".into()))?;
        let len = guard.len();
        Ok(guard[len.saturating_sub(n)..].to_vec())
    }
}
