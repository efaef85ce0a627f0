//! Hooked saves
//!
//! `ModelStore` wraps any `RecordStore` and runs a list of `SaveHook`s inside
//! the write session of every save: all `validate` hooks first, then all
//! `pre_save` hooks, then the insert or update. Any error rolls the session
//! back.

use crate::errors::ModelKitError;
use async_trait::async_trait;
use serde_json::Value;
use store_object::{key_value, QueryBuilder, QueryFilter, Record, RecordStore, StoreSession};

/// A hook run while a record is being saved
#[async_trait]
pub trait SaveHook<T: Record>: Send + Sync {
    /// Check the record before anything is written; an error aborts the save
    async fn validate(
        &self,
        _session: &mut dyn StoreSession<T>,
        _record: &T,
    ) -> Result<(), ModelKitError> {
        Ok(())
    }

    /// Compute derived values right before the record is written
    async fn pre_save(
        &self,
        _session: &mut dyn StoreSession<T>,
        _record: &mut T,
        _creating: bool,
    ) -> Result<(), ModelKitError> {
        Ok(())
    }
}

/// Records sharing `field = group` with `record`, excluding `record` itself
/// once it has a key
pub fn siblings_of<T: Record>(
    field: &str,
    group: &Value,
    record: &T,
) -> Result<QueryBuilder, ModelKitError> {
    let mut query = QueryBuilder::new().filter(QueryFilter::eq(field, group.clone()));
    if let Some(key) = record.key() {
        query = query.filter(QueryFilter::ne(T::primary_key_field(), key_value::<T>(&key)?));
    }
    Ok(query)
}

/// Human readable form of a group value for error messages
pub(crate) fn display_group(group: &Value) -> String {
    match group {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A store whose saves run through hooks
pub struct ModelStore<T: Record, S: RecordStore<T>> {
    store: S,
    hooks: Vec<Box<dyn SaveHook<T>>>,
}

impl<T: Record, S: RecordStore<T>> ModelStore<T, S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            hooks: Vec::new(),
        }
    }

    /// Attach a hook; hooks run in the order they were attached
    pub fn with_hook(mut self, hook: impl SaveHook<T> + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate, compute derived values and write `record` in one session.
    /// Returns the record as stored.
    pub async fn save(&self, mut record: T) -> Result<T, ModelKitError> {
        let mut session = self.store.begin().await?;

        match self.save_in(&mut *session, &mut record).await {
            Ok(saved) => {
                session.commit().await?;
                tracing::debug!(table = T::table_name(), key = ?saved.key(), "record saved");
                Ok(saved)
            }
            Err(e) => {
                if let Err(rollback_error) = session.rollback().await {
                    tracing::warn!(
                        table = T::table_name(),
                        error = %rollback_error,
                        "rollback after failed save also failed"
                    );
                }
                tracing::debug!(table = T::table_name(), error = %e, "save rejected");
                Err(e)
            }
        }
    }

    /// Run only the validation hooks; nothing is written
    pub async fn validate(&self, record: &T) -> Result<(), ModelKitError> {
        let mut session = self.store.begin().await?;
        let result = self.run_validation(&mut *session, record).await;
        session.rollback().await?;
        result
    }

    async fn run_validation(
        &self,
        session: &mut dyn StoreSession<T>,
        record: &T,
    ) -> Result<(), ModelKitError> {
        for hook in &self.hooks {
            hook.validate(session, record).await?;
        }
        Ok(())
    }

    async fn save_in(
        &self,
        session: &mut dyn StoreSession<T>,
        record: &mut T,
    ) -> Result<T, ModelKitError> {
        let creating = match record.key() {
            None => true,
            Some(key) => {
                let query = QueryBuilder::new().filter(QueryFilter::eq(
                    T::primary_key_field(),
                    key_value::<T>(&key)?,
                ));
                !session.exists(query).await?
            }
        };

        self.run_validation(session, record).await?;
        for hook in &self.hooks {
            hook.pre_save(session, record, creating).await?;
        }

        let saved = if creating {
            session.insert(record.clone()).await?
        } else {
            session.update(record.clone()).await?
        };
        Ok(saved)
    }
}

#[async_trait]
impl<T: Record, S: RecordStore<T>> RecordStore<T> for ModelStore<T, S> {
    /// A raw session on the wrapped store; writes through it skip the hooks
    async fn begin(&self) -> Result<Box<dyn StoreSession<T> + '_>, store_object::StorehausError> {
        self.store.begin().await
    }

    async fn find(&self, query: QueryBuilder) -> Result<Vec<T>, store_object::StorehausError> {
        self.store.find(query).await
    }

    async fn count_where(&self, query: QueryBuilder) -> Result<i64, store_object::StorehausError> {
        self.store.count_where(query).await
    }
}

impl<T: Record, S: RecordStore<T> + std::fmt::Debug> std::fmt::Debug for ModelStore<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("store", &self.store)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
