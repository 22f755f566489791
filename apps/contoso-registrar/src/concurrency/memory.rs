//! In-memory versioned store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::record::{FieldEdits, Record, RecordField};
use super::store::{Conditional, ConditionalDelete, ConditionalWrite, VersionedStore};
use super::token::VersionToken;
use crate::error::StoreError;

/// Versioned store backed by a map
///
/// Every conditional operation runs under the write lock, so the token
/// comparison and the change form one step.
#[derive(Clone)]
pub struct MemoryStore<F: RecordField> {
    inner: Arc<MemoryStoreInner<F>>,
}

struct MemoryStoreInner<F: RecordField> {
    records: RwLock<HashMap<i64, Record<F>>>,
    next_id: RwLock<i64>,
}

impl<F: RecordField> MemoryStore<F> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner {
                records: RwLock::new(HashMap::new()),
                next_id: RwLock::new(1),
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.records.read().await.is_empty()
    }
}

impl<F: RecordField> Default for MemoryStore<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<F: RecordField> VersionedStore for MemoryStore<F> {
    type Field = F;

    async fn get(&self, id: i64) -> Result<Option<Record<F>>, StoreError> {
        Ok(self.inner.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, values: &FieldEdits<F>) -> Result<Record<F>, StoreError> {
        let mut records = self.inner.records.write().await;
        let id = {
            let mut next_id = self.inner.next_id.write().await;
            let id = *next_id;
            *next_id += 1;
            id
        };

        let record = Record::new(id, VersionToken::generate()).overlay(values);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn try_conditional_write(
        &self,
        id: i64,
        expected: VersionToken,
        values: &FieldEdits<F>,
    ) -> Result<ConditionalWrite<F>, StoreError> {
        let mut records = self.inner.records.write().await;
        let Some(current) = records.get_mut(&id) else {
            return Ok(Conditional::NotFound);
        };
        if current.version != expected {
            return Ok(Conditional::Conflict(current.clone()));
        }

        let token = VersionToken::successor_of(expected);
        *current = current.overlay(values).with_version(token);
        Ok(Conditional::Applied(token))
    }

    async fn try_conditional_delete(
        &self,
        id: i64,
        expected: VersionToken,
    ) -> Result<ConditionalDelete<F>, StoreError> {
        let mut records = self.inner.records.write().await;
        match records.get(&id) {
            None => Ok(Conditional::NotFound),
            Some(current) if current.version != expected => {
                Ok(Conditional::Conflict(current.clone()))
            }
            Some(_) => {
                records.remove(&id);
                Ok(Conditional::Applied(()))
            }
        }
    }
}
