//! Creation and modification tracking
//!
//! Records implementing `Timestamped` get `created` stamped and a UUID `key`
//! assigned on insert, and `modified` refreshed on every save, when saved
//! through a `ModelStore` carrying a `TimestampHook`.

use crate::errors::ModelKitError;
use crate::model_store::SaveHook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::marker::PhantomData;
use store_object::{QueryBuilder, Record, RecordStore, SortOrder, StoreSession};
use uuid::Uuid;

pub const CREATED: &str = "created";
pub const MODIFIED: &str = "modified";

pub trait Timestamped: Record {
    fn created(&self) -> Option<DateTime<Utc>>;
    fn set_created(&mut self, at: DateTime<Utc>);
    fn modified(&self) -> Option<DateTime<Utc>>;
    fn set_modified(&mut self, at: DateTime<Utc>);

    /// The public UUID of the record, distinct from its primary key
    fn uuid_key(&self) -> Option<Uuid>;
    fn set_uuid_key(&mut self, key: Uuid);
}

pub struct TimestampHook<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> TimestampHook<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for TimestampHook<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Timestamped> SaveHook<T> for TimestampHook<T> {
    async fn pre_save(
        &self,
        _session: &mut dyn StoreSession<T>,
        record: &mut T,
        creating: bool,
    ) -> Result<(), ModelKitError> {
        let now = Utc::now();
        if creating {
            record.set_created(now);
            if record.uuid_key().is_none() {
                record.set_uuid_key(Uuid::new_v4());
            }
        }
        record.set_modified(now);
        Ok(())
    }
}

fn field_of<T: Record>(record: &T, field: &str) -> Result<Value, ModelKitError> {
    Ok(record.to_row()?.get(field).cloned().unwrap_or(Value::Null))
}

/// Whether `field` of `record` differs from the stored row. An unsaved record
/// has always changed; a key with no stored row compares against null.
pub async fn has_changed<T, S>(store: &S, record: &T, field: &str) -> Result<bool, ModelKitError>
where
    T: Record,
    S: RecordStore<T> + ?Sized,
{
    let Some(key) = record.key() else {
        return Ok(true);
    };

    let current = field_of(record, field)?;
    let stored = match store.get_by_key(&key).await? {
        Some(stored) => field_of(&stored, field)?,
        None => Value::Null,
    };
    Ok(current != stored)
}

/// The most recently created record matching `query`
pub async fn latest<T, S>(store: &S, query: QueryBuilder) -> Result<Option<T>, ModelKitError>
where
    T: Timestamped,
    S: RecordStore<T> + ?Sized,
{
    Ok(store
        .find_one(query.order_by(CREATED, SortOrder::Desc))
        .await?)
}
