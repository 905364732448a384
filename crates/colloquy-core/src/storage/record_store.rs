//! Record store trait.
//!
//! Persists flat tagged records keyed by `(owner_id, agent_id, kind)`.
//! Implementations live in colloquy-infra.

use std::future::Future;
use std::pin::Pin;

use colloquy_types::error::RepositoryError;
use colloquy_types::storage::{RecordFilter, StoredRecord};

/// Trait for the persistent document store.
///
/// Every save is a full overwrite of the affected keys, so repeating a save
/// is harmless. Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait RecordStore: Send + Sync {
    /// Insert or replace every record by its `(owner_id, agent_id, kind)` key.
    fn upsert(
        &self,
        records: &[StoredRecord],
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// All records matching the filter.
    fn get_all(
        &self,
        filter: &RecordFilter,
    ) -> impl Future<Output = Result<Vec<StoredRecord>, RepositoryError>> + Send;

    /// Delete all records matching the filter. Returns the number removed.
    fn delete_all(
        &self,
        filter: &RecordFilter,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`RecordStore`] with boxed futures.
pub trait RecordStoreDyn: Send + Sync {
    fn upsert_boxed<'a>(&'a self, records: &'a [StoredRecord]) -> BoxFut<'a, ()>;

    fn get_all_boxed<'a>(&'a self, filter: &'a RecordFilter) -> BoxFut<'a, Vec<StoredRecord>>;

    fn delete_all_boxed<'a>(&'a self, filter: &'a RecordFilter) -> BoxFut<'a, u64>;
}

impl<T: RecordStore> RecordStoreDyn for T {
    fn upsert_boxed<'a>(&'a self, records: &'a [StoredRecord]) -> BoxFut<'a, ()> {
        Box::pin(self.upsert(records))
    }

    fn get_all_boxed<'a>(&'a self, filter: &'a RecordFilter) -> BoxFut<'a, Vec<StoredRecord>> {
        Box::pin(self.get_all(filter))
    }

    fn delete_all_boxed<'a>(&'a self, filter: &'a RecordFilter) -> BoxFut<'a, u64> {
        Box::pin(self.delete_all(filter))
    }
}

/// Type-erased record store shared by every session.
pub struct BoxRecordStore {
    inner: Box<dyn RecordStoreDyn + Send + Sync>,
}

impl BoxRecordStore {
    pub fn new<T: RecordStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn upsert(&self, records: &[StoredRecord]) -> Result<(), RepositoryError> {
        self.inner.upsert_boxed(records).await
    }

    pub async fn get_all(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>, RepositoryError> {
        self.inner.get_all_boxed(filter).await
    }

    pub async fn delete_all(&self, filter: &RecordFilter) -> Result<u64, RepositoryError> {
        self.inner.delete_all_boxed(filter).await
    }
}

impl std::fmt::Debug for BoxRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxRecordStore").finish_non_exhaustive()
    }
}
