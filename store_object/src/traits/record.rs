//! Record trait
//!
//! A record is a serde-serializable row of a single table. Stores move records
//! through `serde_json::Value` for filtering and parameter binding, so the
//! serialized field names must match the column names.

use crate::errors::StorehausError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// A persisted entity of one table
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use store_object::Record;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Email {
///     pub id: Option<i64>,
///     pub person_id: i64,
///     pub email: String,
///     pub is_primary: bool,
/// }
///
/// impl Record for Email {
///     type Key = i64;
///
///     fn table_name() -> &'static str {
///         "emails"
///     }
///
///     fn key(&self) -> Option<i64> {
///         self.id
///     }
/// }
/// ```
pub trait Record:
    Clone + Send + Sync + Debug + Serialize + DeserializeOwned + Unpin + 'static
{
    /// Primary key type
    type Key: Clone + Send + Sync + Debug + PartialEq + Serialize;

    /// The table name in the database
    fn table_name() -> &'static str;

    /// The primary key column
    fn primary_key_field() -> &'static str {
        "id"
    }

    /// The primary key, `None` for a record that was never saved
    fn key(&self) -> Option<Self::Key>;

    /// Serialize the record into a JSON object keyed by column name
    fn to_row(&self) -> Result<Value, StorehausError> {
        let row = serde_json::to_value(self)
            .map_err(|e| StorehausError::serialization(Self::table_name(), e))?;
        if !row.is_object() {
            return Err(StorehausError::SerializationError(format!(
                "{} must serialize to a JSON object",
                Self::table_name()
            )));
        }
        Ok(row)
    }

    /// Rebuild a record from a JSON row
    fn from_row(row: Value) -> Result<Self, StorehausError> {
        serde_json::from_value(row).map_err(|e| StorehausError::serialization(Self::table_name(), e))
    }
}

/// Convert a primary key into the JSON value used in filters
pub fn key_value<T: Record>(key: &T::Key) -> Result<Value, StorehausError> {
    serde_json::to_value(key).map_err(|e| StorehausError::serialization(T::table_name(), e))
}
