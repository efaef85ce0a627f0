//! Transaction support for GenericStore
//!
//! A `PgSession` wraps a sqlx transaction. Writes become visible on
//! `commit`; dropping the session rolls it back.

use super::store_object::{
    count_sql, execute, fetch_optional_record, fetch_records, fetch_total, insert_sql, select_sql,
    update_sql, update_where_sql,
};
use crate::errors::StorehausError;
use crate::query_builder::{QueryBuilder, UpdateSet};
use crate::traits::{Record, StoreSession};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Transaction};
use std::marker::PhantomData;

/// A transactional session over one table
pub struct PgSession<T: Record> {
    tx: Transaction<'static, Postgres>,
    _phantom: PhantomData<T>,
}

impl<T: Record> PgSession<T> {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx,
            _phantom: PhantomData,
        }
    }
}

/// Advisory lock key for a group; hashed by PostgreSQL with `hashtext`
pub(crate) fn group_lock_key(table: &str, field: &str, value: &Value) -> String {
    format!("{}:{}={}", table, field, value)
}

#[async_trait]
impl<T> StoreSession<T> for PgSession<T>
where
    T: Record + for<'r> sqlx::FromRow<'r, PgRow>,
{
    async fn lock_group(&mut self, field: &str, value: &Value) -> Result<(), StorehausError> {
        let key = group_lock_key(T::table_name(), field, value);
        tracing::debug!(table = T::table_name(), lock = %key, "acquiring group lock");

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StorehausError::database_operation(T::table_name(), "lock_group", e))?;
        Ok(())
    }

    async fn find(&mut self, query: QueryBuilder) -> Result<Vec<T>, StorehausError> {
        let (sql, params) = select_sql::<T>(&query)?;
        fetch_records(&mut *self.tx, &sql, params).await
    }

    async fn count_where(&mut self, query: QueryBuilder) -> Result<i64, StorehausError> {
        let (sql, params) = count_sql::<T>(&query)?;
        fetch_total::<T, _>(&mut *self.tx, &sql, params).await
    }

    async fn update_where(
        &mut self,
        query: QueryBuilder,
        updates: UpdateSet,
    ) -> Result<u64, StorehausError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let (sql, params) = update_where_sql::<T>(&query, &updates)?;
        let affected = execute::<T, _>(&mut *self.tx, &sql, params).await?;

        tracing::debug!(table = T::table_name(), affected, "bulk update");
        Ok(affected)
    }

    async fn insert(&mut self, record: T) -> Result<T, StorehausError> {
        let (sql, params) = insert_sql(&record)?;
        fetch_optional_record(&mut *self.tx, &sql, params)
            .await?
            .ok_or_else(|| {
                StorehausError::NotFound(format!("{} insert returned no row", T::table_name()))
            })
    }

    async fn update(&mut self, record: T) -> Result<T, StorehausError> {
        let (sql, params) = update_sql(&record)?;
        fetch_optional_record(&mut *self.tx, &sql, params)
            .await?
            .ok_or_else(|| {
                StorehausError::NotFound(format!("{} record {:?}", T::table_name(), record.key()))
            })
    }

    async fn commit(self: Box<Self>) -> Result<(), StorehausError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StorehausError::database_operation(T::table_name(), "commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorehausError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StorehausError::database_operation(T::table_name(), "rollback", e))
    }
}
