//! Persistence abstraction for resource records.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::record::{Fields, Record};

pub mod memory;
pub mod query;
pub mod sqlite;

use query::{Filter, ListQuery};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(Uuid),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn timed_out(operation: &str) -> Self {
        Self::Unavailable(format!("{operation} timed out"))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                Self::Unavailable(e.to_string())
            }
            sqlx::Error::Io(io) => Self::Unavailable(io.to_string()),
            other => Self::Database(other),
        }
    }
}

/// Record persistence, shared by every request in the process.
///
/// Each operation is atomic for the record it touches. Operations are scoped
/// by resource kind; a record is never visible under another kind.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist `fields` under a freshly generated identifier.
    async fn insert(&self, kind: &str, fields: Fields) -> Result<Record, StoreError>;

    async fn get(&self, kind: &str, id: Uuid) -> Result<Option<Record>, StoreError>;

    /// Records matching the query, in insertion order unless sorted.
    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Vec<Record>, StoreError>;

    /// Merge `changes` into the record. A `null` value removes the field.
    /// Returns `None` when the record does not exist.
    async fn update(
        &self,
        kind: &str,
        id: Uuid,
        changes: Fields,
    ) -> Result<Option<Record>, StoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, kind: &str, id: Uuid) -> Result<bool, StoreError>;

    /// Delete every record matching `filter`, returning how many went away.
    async fn delete_many(&self, kind: &str, filter: &Filter) -> Result<u64, StoreError>;
}
