use crate::errors::StorehausError;
use crate::query_builder::QueryBuilder;
use crate::traits::Record;
use crate::validation::{ValidatedFieldName, ValidatedTableName};
use crate::DbPool;

/// PostgreSQL store for one record type
#[derive(Clone)]
pub struct GenericStore<T: Record> {
    pub(crate) db_pool: DbPool,
    pub(crate) _phantom: std::marker::PhantomData<T>,
}

impl<T: Record> std::fmt::Debug for GenericStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericStore")
            .field("table", &T::table_name())
            .field("pool_size", &self.db_pool.size())
            .finish()
    }
}

impl<T: Record> GenericStore<T> {
    /// Create a store for `T`. Fails when the table or key column name is not
    /// a safe SQL identifier.
    pub fn new(db_pool: DbPool) -> Result<Self, StorehausError> {
        ValidatedTableName::new(T::table_name())?;
        ValidatedFieldName::new(T::primary_key_field())?;

        Ok(Self {
            db_pool,
            _phantom: std::marker::PhantomData,
        })
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.db_pool
    }
}

/// Reject queries that reference a field name which cannot be safely
/// interpolated into SQL
pub(crate) fn check_query_fields(query: &QueryBuilder) -> Result<(), StorehausError> {
    for field in query.referenced_fields() {
        ValidatedFieldName::new(field)?;
    }
    Ok(())
}
