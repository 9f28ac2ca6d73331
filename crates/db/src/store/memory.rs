use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    RecordStore, StoreError,
    query::{Filter, ListQuery, compare_records},
};
use crate::models::record::{Fields, Record};

#[derive(Default)]
struct Inner {
    next_seq: u64,
    rows: BTreeMap<u64, (String, Record)>,
    index: HashMap<Uuid, u64>,
}

impl Inner {
    fn find(&self, kind: &str, id: Uuid) -> Option<u64> {
        let seq = *self.index.get(&id)?;
        match self.rows.get(&seq) {
            Some((k, _)) if k == kind => Some(seq),
            _ => None,
        }
    }

    fn remove(&mut self, seq: u64) {
        if let Some((_, record)) = self.rows.remove(&seq) {
            self.index.remove(&record.id);
        }
    }
}

/// Process-local record store. Nothing survives a restart.
///
/// Every operation runs under a single lock, which gives the same per-record
/// atomicity as the SQLite store.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, kind: &str, fields: Fields) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        let id = Uuid::new_v4();
        if inner.index.contains_key(&id) {
            return Err(StoreError::DuplicateKey(id));
        }

        let now = Utc::now();
        let record = Record {
            id,
            fields,
            created_at: now,
            updated_at: now,
        };
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.rows.insert(seq, (kind.to_string(), record.clone()));
        inner.index.insert(id, seq);
        Ok(record)
    }

    async fn get(&self, kind: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .find(kind, id)
            .and_then(|seq| inner.rows.get(&seq))
            .map(|(_, record)| record.clone()))
    }

    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Vec<Record>, StoreError> {
        let inner = self.inner.read().await;
        let mut records: Vec<Record> = inner
            .rows
            .values()
            .filter(|(k, record)| k == kind && query.filter.matches(&record.fields))
            .map(|(_, record)| record.clone())
            .collect();
        drop(inner);

        if let Some(sort) = &query.sort {
            // sort_by is stable: rows arrive in insertion order.
            records.sort_by(|a, b| compare_records(a, b, sort));
        }

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(
        &self,
        kind: &str,
        id: Uuid,
        changes: Fields,
    ) -> Result<Option<Record>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(seq) = inner.find(kind, id) else {
            return Ok(None);
        };
        let Some((_, record)) = inner.rows.get_mut(&seq) else {
            return Ok(None);
        };

        for (field, value) in changes {
            if value.is_null() {
                record.fields.remove(&field);
            } else {
                record.fields.insert(field, value);
            }
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete(&self, kind: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.find(kind, id) {
            Some(seq) => {
                inner.remove(seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, kind: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<u64> = inner
            .rows
            .iter()
            .filter(|(_, (k, record))| k == kind && filter.matches(&record.fields))
            .map(|(seq, _)| *seq)
            .collect();
        for seq in &doomed {
            inner.remove(*seq);
        }
        Ok(doomed.len() as u64)
    }
}
