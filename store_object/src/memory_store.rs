//! In-memory record store
//!
//! Rows are kept as JSON objects and filtered with the same `QueryFilter`
//! values the SQL store renders. A session holds the table lock for its whole
//! lifetime and writes to a staged copy, so sessions are fully serialized and
//! an uncommitted session leaves no trace.

use crate::errors::StorehausError;
use crate::query_builder::evaluate::sort_rows;
use crate::query_builder::{QueryBuilder, UpdateSet};
use crate::traits::{key_value, Record, RecordStore, StoreSession};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    rows: Vec<Value>,
    next_id: i64,
}

impl MemoryTable {
    fn select(&self, query: &QueryBuilder) -> Vec<Value> {
        let mut rows: Vec<Value> = self
            .rows
            .iter()
            .filter(|row| query.conditions.iter().all(|filter| filter.matches(row)))
            .cloned()
            .collect();

        sort_rows(&mut rows, &query.order_by);

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        rows.into_iter().skip(offset).take(limit).collect()
    }

    fn count(&self, query: &QueryBuilder) -> i64 {
        self.rows
            .iter()
            .filter(|row| query.conditions.iter().all(|filter| filter.matches(row)))
            .count() as i64
    }

    fn position_of(&self, key_field: &str, key: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(key_field) == Some(key))
    }
}

fn decode_rows<T: Record>(rows: Vec<Value>) -> Result<Vec<T>, StorehausError> {
    rows.into_iter().map(T::from_row).collect()
}

/// A table held in process memory
pub struct MemoryStore<T: Record> {
    table: Arc<Mutex<MemoryTable>>,
    _phantom: PhantomData<T>,
}

impl<T: Record> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            _phantom: PhantomData,
        }
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> std::fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("table", &T::table_name())
            .finish()
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(MemoryTable {
                rows: Vec::new(),
                next_id: 1,
            })),
            _phantom: PhantomData,
        }
    }

    /// Every stored record, in insertion order
    pub async fn all(&self) -> Result<Vec<T>, StorehausError> {
        let table = self.table.lock().await;
        decode_rows(table.rows.clone())
    }
}

#[async_trait]
impl<T: Record> RecordStore<T> for MemoryStore<T> {
    async fn begin(&self) -> Result<Box<dyn StoreSession<T> + '_>, StorehausError> {
        let guard = Arc::clone(&self.table).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemorySession {
            guard,
            staged,
            _phantom: PhantomData,
        }))
    }

    async fn find(&self, query: QueryBuilder) -> Result<Vec<T>, StorehausError> {
        let rows = self.table.lock().await.select(&query);
        decode_rows(rows)
    }

    async fn count_where(&self, query: QueryBuilder) -> Result<i64, StorehausError> {
        Ok(self.table.lock().await.count(&query))
    }
}

/// Exclusive session over a `MemoryStore`
pub struct MemorySession<T: Record> {
    guard: OwnedMutexGuard<MemoryTable>,
    staged: MemoryTable,
    _phantom: PhantomData<T>,
}

#[async_trait]
impl<T: Record> StoreSession<T> for MemorySession<T> {
    async fn lock_group(&mut self, _field: &str, _value: &Value) -> Result<(), StorehausError> {
        // The whole table is already held by this session
        Ok(())
    }

    async fn find(&mut self, query: QueryBuilder) -> Result<Vec<T>, StorehausError> {
        decode_rows(self.staged.select(&query))
    }

    async fn count_where(&mut self, query: QueryBuilder) -> Result<i64, StorehausError> {
        Ok(self.staged.count(&query))
    }

    async fn update_where(
        &mut self,
        query: QueryBuilder,
        updates: UpdateSet,
    ) -> Result<u64, StorehausError> {
        let mut affected = 0;
        for row in self.staged.rows.iter_mut() {
            if !query.conditions.iter().all(|filter| filter.matches(row)) {
                continue;
            }
            if let Value::Object(map) = row {
                updates.apply(map);
                affected += 1;
            }
        }

        tracing::debug!(table = T::table_name(), affected, "bulk update");
        Ok(affected)
    }

    async fn insert(&mut self, record: T) -> Result<T, StorehausError> {
        let key_field = T::primary_key_field();
        let mut row = record.to_row()?;

        let key = match row.get(key_field) {
            Some(key) if !key.is_null() => key.clone(),
            _ => {
                let key = Value::from(self.staged.next_id);
                self.staged.next_id += 1;
                if let Value::Object(map) = &mut row {
                    map.insert(key_field.to_string(), key.clone());
                }
                key
            }
        };

        if self.staged.position_of(key_field, &key).is_some() {
            return Err(StorehausError::Conflict(format!(
                "{} already has a record with {} = {}",
                T::table_name(),
                key_field,
                key
            )));
        }

        if let Some(explicit) = key.as_i64() {
            self.staged.next_id = self.staged.next_id.max(explicit + 1);
        }

        crate::trace_log!("[MEMORY_INSERT] {} {}", T::table_name(), key);
        self.staged.rows.push(row.clone());
        T::from_row(row)
    }

    async fn update(&mut self, record: T) -> Result<T, StorehausError> {
        let key_field = T::primary_key_field();
        let key = match record.key() {
            Some(key) => key_value::<T>(&key)?,
            None => {
                return Err(StorehausError::NotFound(format!(
                    "{} record without a key",
                    T::table_name()
                )))
            }
        };

        let position = self.staged.position_of(key_field, &key).ok_or_else(|| {
            StorehausError::NotFound(format!("{} record {}", T::table_name(), key))
        })?;

        let row = record.to_row()?;
        self.staged.rows[position] = row.clone();
        T::from_row(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorehausError> {
        let MemorySession {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorehausError> {
        Ok(())
    }
}
