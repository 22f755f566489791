//! Conditional reads, writes and deletes over a versioned backing store

use async_trait::async_trait;

use super::record::{EditIntent, FieldEdits, Record, RecordField};
use super::token::VersionToken;
use crate::error::{AppError, Result, StoreError};

/// Result of a conditional write or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional<T, F: RecordField> {
    /// The expected token matched and the change was committed
    Applied(T),
    /// Another writer got there first; nothing was changed
    Conflict(Record<F>),
    /// The record does not exist (possibly deleted concurrently)
    NotFound,
}

/// Outcome of a conditional write, carrying the new token on success
pub type ConditionalWrite<F> = Conditional<VersionToken, F>;

/// Outcome of a conditional delete
pub type ConditionalDelete<F> = Conditional<(), F>;

/// Transactional store holding versioned records
///
/// Implementations must evaluate "record has `id` and its token equals
/// `expected`" atomically with the change itself, and must generate a new
/// token on every successful write.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    type Field: RecordField;

    async fn get(&self, id: i64) -> std::result::Result<Option<Record<Self::Field>>, StoreError>;

    /// Insert a new record with a fresh token
    async fn insert(
        &self,
        values: &FieldEdits<Self::Field>,
    ) -> std::result::Result<Record<Self::Field>, StoreError>;

    async fn try_conditional_write(
        &self,
        id: i64,
        expected: VersionToken,
        values: &FieldEdits<Self::Field>,
    ) -> std::result::Result<ConditionalWrite<Self::Field>, StoreError>;

    async fn try_conditional_delete(
        &self,
        id: i64,
        expected: VersionToken,
    ) -> std::result::Result<ConditionalDelete<Self::Field>, StoreError>;
}

/// Versioned record access for request handlers
///
/// Wraps a [`VersionedStore`] and is the only path through which stored
/// records change. Holds no records between calls.
pub struct VersionedRecordStore<S> {
    backing: S,
}

impl<S> VersionedRecordStore<S>
where
    S: VersionedStore,
{
    pub fn new(backing: S) -> Self {
        Self { backing }
    }

    pub fn backing(&self) -> &S {
        &self.backing
    }

    pub async fn read(&self, id: i64) -> Result<Record<S::Field>> {
        self.backing
            .get(id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| AppError::NotFound(format!("Record not found: {}", id)))
    }

    pub async fn create(&self, values: &FieldEdits<S::Field>) -> Result<Record<S::Field>> {
        let record = self.backing.insert(values).await.map_err(store_failure)?;
        tracing::info!(id = record.id, version = %record.version, "Created record");
        Ok(record)
    }

    /// Apply `intent` only if the stored token still equals `intent.token()`
    pub async fn conditional_update(
        &self,
        id: i64,
        intent: &EditIntent<S::Field>,
    ) -> Result<ConditionalWrite<S::Field>> {
        let outcome = self
            .backing
            .try_conditional_write(id, intent.token(), intent.edits())
            .await
            .map_err(store_failure)?;

        match &outcome {
            Conditional::Applied(token) => {
                if *token == intent.token() {
                    return Err(AppError::Internal(format!(
                        "store kept version {} after writing record {}",
                        token, id
                    )));
                }
                tracing::debug!(id = id, version = %token, "Conditional update applied");
            }
            Conditional::Conflict(current) => {
                tracing::info!(
                    id = id,
                    expected = %intent.token(),
                    current = %current.version,
                    "Update rejected: record was modified concurrently"
                );
            }
            Conditional::NotFound => {
                tracing::info!(id = id, "Update rejected: record no longer exists");
            }
        }

        Ok(outcome)
    }

    /// Delete only if the stored token still equals `token`
    pub async fn conditional_delete(
        &self,
        id: i64,
        token: VersionToken,
    ) -> Result<ConditionalDelete<S::Field>> {
        let outcome = self
            .backing
            .try_conditional_delete(id, token)
            .await
            .map_err(store_failure)?;

        match &outcome {
            Conditional::Applied(()) => tracing::debug!(id = id, "Conditional delete applied"),
            Conditional::Conflict(current) => tracing::info!(
                id = id,
                expected = %token,
                current = %current.version,
                "Delete rejected: record was modified concurrently"
            ),
            Conditional::NotFound => tracing::info!(id = id, "Delete found no record"),
        }

        Ok(outcome)
    }
}

fn store_failure(err: StoreError) -> AppError {
    match err {
        StoreError::Rejected(_) => tracing::info!("Versioned store refused values: {}", err),
        _ => tracing::error!("Versioned store failure: {}", err),
    }
    AppError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::memory::MemoryStore;
    use crate::concurrency::record::tests::Widget;
    use crate::concurrency::record::FieldValue;

    fn title(s: &str) -> FieldEdits<Widget> {
        let mut edits = FieldEdits::new();
        edits.insert(Widget::Title, FieldValue::Text(s.to_string()));
        edits
    }

    async fn seeded() -> (VersionedRecordStore<MemoryStore<Widget>>, Record<Widget>) {
        let store = VersionedRecordStore::new(MemoryStore::new());
        let record = store.create(&title("A")).await.unwrap();
        (store, record)
    }

    #[tokio::test]
    async fn test_update_returns_new_token() {
        let (store, record) = seeded().await;
        let intent = EditIntent::new(record.version, title("B"));

        match store.conditional_update(record.id, &intent).await.unwrap() {
            Conditional::Applied(token) => {
                assert_ne!(token, record.version);
                let stored = store.read(record.id).await.unwrap();
                assert_eq!(stored.version, token);
                assert_eq!(stored.get(Widget::Title), Some(&FieldValue::Text("B".to_string())));
            }
            other => panic!("expected applied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_token_cannot_win_twice() {
        let (store, record) = seeded().await;

        let first = store
            .conditional_update(record.id, &EditIntent::new(record.version, title("B")))
            .await
            .unwrap();
        let second = store
            .conditional_update(record.id, &EditIntent::new(record.version, title("C")))
            .await
            .unwrap();

        assert!(matches!(first, Conditional::Applied(_)));
        match second {
            Conditional::Conflict(current) => {
                assert_eq!(current.get(Widget::Title), Some(&FieldValue::Text("B".to_string())));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_distinguishes_conflict_and_missing() {
        let (store, record) = seeded().await;
        let stale = record.version;

        store
            .conditional_update(record.id, &EditIntent::new(stale, title("B")))
            .await
            .unwrap();

        let conflict = store.conditional_delete(record.id, stale).await.unwrap();
        let current = match conflict {
            Conditional::Conflict(current) => current,
            other => panic!("expected conflict, got {:?}", other),
        };

        assert_eq!(
            store.conditional_delete(record.id, current.version).await.unwrap(),
            Conditional::Applied(())
        );
        assert_eq!(
            store.conditional_delete(record.id, current.version).await.unwrap(),
            Conditional::NotFound
        );
        assert!(matches!(
            store.read(record.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_after_delete_is_not_found() {
        let (store, record) = seeded().await;
        store.conditional_delete(record.id, record.version).await.unwrap();

        let outcome = store
            .conditional_update(record.id, &EditIntent::new(record.version, title("B")))
            .await
            .unwrap();
        assert_eq!(outcome, Conditional::NotFound);
    }

    /// Backing store that reports the old token as the new one
    struct StuckStore;

    #[async_trait]
    impl VersionedStore for StuckStore {
        type Field = Widget;

        async fn get(&self, _id: i64) -> std::result::Result<Option<Record<Widget>>, StoreError> {
            Ok(None)
        }

        async fn insert(
            &self,
            _values: &FieldEdits<Widget>,
        ) -> std::result::Result<Record<Widget>, StoreError> {
            Err(StoreError::Corrupt("read-only".to_string()))
        }

        async fn try_conditional_write(
            &self,
            _id: i64,
            expected: VersionToken,
            _values: &FieldEdits<Widget>,
        ) -> std::result::Result<ConditionalWrite<Widget>, StoreError> {
            Ok(Conditional::Applied(expected))
        }

        async fn try_conditional_delete(
            &self,
            _id: i64,
            _expected: VersionToken,
        ) -> std::result::Result<ConditionalDelete<Widget>, StoreError> {
            Ok(Conditional::NotFound)
        }
    }

    #[tokio::test]
    async fn test_unchanged_token_is_rejected() {
        let store = VersionedRecordStore::new(StuckStore);
        let intent = EditIntent::new(VersionToken::generate(), title("B"));
        assert!(matches!(
            store.conditional_update(1, &intent).await,
            Err(AppError::Internal(_))
        ));
    }
}
