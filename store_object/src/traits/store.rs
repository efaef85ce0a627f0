//! Store traits
//!
//! `RecordStore` is the read side plus the entry point for writes; every
//! write goes through a `StoreSession`, which is a transaction in the SQL
//! store and an exclusive staged copy in the memory store.

use super::record::{key_value, Record};
use crate::errors::StorehausError;
use crate::query_builder::{QueryBuilder, QueryFilter, UpdateSet};
use async_trait::async_trait;
use serde_json::Value;

/// A unit of work against one table. Dropping a session without calling
/// `commit` discards its writes.
#[async_trait]
pub trait StoreSession<T: Record>: Send {
    /// Serialize writers touching the same group (`field = value`) until the
    /// session ends
    async fn lock_group(&mut self, field: &str, value: &Value) -> Result<(), StorehausError>;

    /// Find records matching query conditions
    async fn find(&mut self, query: QueryBuilder) -> Result<Vec<T>, StorehausError>;

    /// Count records matching query conditions
    async fn count_where(&mut self, query: QueryBuilder) -> Result<i64, StorehausError>;

    /// Whether any record matches
    async fn exists(&mut self, query: QueryBuilder) -> Result<bool, StorehausError> {
        Ok(self.count_where(query).await? > 0)
    }

    /// Set fields on every matching record, bypassing any save hooks.
    /// Returns the number of affected records.
    async fn update_where(
        &mut self,
        query: QueryBuilder,
        updates: UpdateSet,
    ) -> Result<u64, StorehausError>;

    /// Insert a record and return it as stored (with its generated key)
    async fn insert(&mut self, record: T) -> Result<T, StorehausError>;

    /// Overwrite the stored record with the same key
    async fn update(&mut self, record: T) -> Result<T, StorehausError>;

    /// Make the session's writes visible
    async fn commit(self: Box<Self>) -> Result<(), StorehausError>;

    /// Discard the session's writes
    async fn rollback(self: Box<Self>) -> Result<(), StorehausError>;
}

/// A table of records
#[async_trait]
pub trait RecordStore<T: Record>: Send + Sync {
    /// Open a write session
    async fn begin(&self) -> Result<Box<dyn StoreSession<T> + '_>, StorehausError>;

    /// Find records matching query conditions
    async fn find(&self, query: QueryBuilder) -> Result<Vec<T>, StorehausError>;

    /// Count records matching query conditions
    async fn count_where(&self, query: QueryBuilder) -> Result<i64, StorehausError>;

    /// Find first record matching query conditions
    async fn find_one(&self, query: QueryBuilder) -> Result<Option<T>, StorehausError> {
        Ok(self.find(query.limit(1)).await?.into_iter().next())
    }

    /// Whether any record matches
    async fn exists(&self, query: QueryBuilder) -> Result<bool, StorehausError> {
        Ok(self.count_where(query).await? > 0)
    }

    /// Get a record by its primary key
    async fn get_by_key(&self, key: &T::Key) -> Result<Option<T>, StorehausError> {
        let query = QueryBuilder::new().filter(QueryFilter::eq(
            T::primary_key_field(),
            key_value::<T>(key)?,
        ));
        self.find_one(query).await
    }
}
