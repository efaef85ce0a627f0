//! Primary flag enforcement
//!
//! A boolean column of which at most one record per group may be true. Saving
//! a record with the flag set clears it on every sibling; saving a record
//! without it promotes the record when no sibling holds the flag, so a
//! non-empty group that has been written always has exactly one primary.

use crate::errors::ModelKitError;
use crate::model_store::{siblings_of, SaveHook};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::marker::PhantomData;
use store_object::{key_value, QueryBuilder, QueryFilter, Record, SortOrder, StoreSession, UpdateSet};

/// Which column is the flag and which column defines the group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryFlagField {
    pub flag: &'static str,
    pub filter_on: &'static str,
}

impl PrimaryFlagField {
    pub const DEFAULT_FLAG: &'static str = "is_primary";

    pub const fn new(flag: &'static str, filter_on: &'static str) -> Self {
        Self { flag, filter_on }
    }

    /// The `is_primary` column, grouped by `filter_on`
    pub const fn on(filter_on: &'static str) -> Self {
        Self::new(Self::DEFAULT_FLAG, filter_on)
    }
}

/// A record carrying a primary flag
///
/// ```
/// use modelkit::primary_flag::{PrimaryFlagField, PrimaryFlagged};
/// use serde::{Deserialize, Serialize};
/// use serde_json::{json, Value};
/// use store_object::Record;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Email {
///     pub id: Option<i64>,
///     pub person_id: i64,
///     pub is_primary: bool,
/// }
///
/// impl Record for Email {
///     type Key = i64;
///     fn table_name() -> &'static str { "emails" }
///     fn key(&self) -> Option<i64> { self.id }
/// }
///
/// impl PrimaryFlagged for Email {
///     const PRIMARY_FLAG: PrimaryFlagField = PrimaryFlagField::on("person_id");
///     fn group_value(&self) -> Value { json!(self.person_id) }
///     fn is_primary(&self) -> bool { self.is_primary }
///     fn set_primary(&mut self, value: bool) { self.is_primary = value }
/// }
/// ```
pub trait PrimaryFlagged: Record {
    const PRIMARY_FLAG: PrimaryFlagField;

    /// Value of the `filter_on` column
    fn group_value(&self) -> Value;

    fn is_primary(&self) -> bool;

    fn set_primary(&mut self, value: bool);
}

/// Settle the flag of `record` against its siblings and return the value
/// that will be stored. Clearing siblings is a bulk update, so no hooks run
/// on them.
pub async fn resolve_primary_flag<T: PrimaryFlagged>(
    session: &mut dyn StoreSession<T>,
    record: &mut T,
) -> Result<bool, ModelKitError> {
    let field = T::PRIMARY_FLAG;
    let group = record.group_value();

    session.lock_group(field.filter_on, &group).await?;
    let flagged_siblings =
        siblings_of(field.filter_on, &group, record)?.filter(QueryFilter::eq(field.flag, json!(true)));

    if record.is_primary() {
        let cleared = session
            .update_where(flagged_siblings, UpdateSet::new().set(field.flag, json!(false)))
            .await?;
        if cleared > 0 {
            tracing::debug!(
                table = T::table_name(),
                group = %group,
                cleared,
                "primary flag moved"
            );
        }
        return Ok(true);
    }

    let has_primary = !session
        .find(flagged_siblings.for_update().limit(1))
        .await?
        .is_empty();
    if !has_primary {
        crate::debug_log!("[PRIMARY] promoting lone {} record in group {}", T::table_name(), group);
        record.set_primary(true);
    }
    Ok(record.is_primary())
}

/// When a saved primary is moving to another group, hand its flag to one of
/// the members left behind. Returns the key of the promoted record.
pub async fn promote_in_vacated_group<T: PrimaryFlagged>(
    session: &mut dyn StoreSession<T>,
    record: &T,
) -> Result<Option<Value>, ModelKitError> {
    let Some(key) = record.key() else {
        return Ok(None);
    };
    let field = T::PRIMARY_FLAG;
    let key_field = T::primary_key_field();
    let key = key_value::<T>(&key)?;

    let stored = session
        .find(QueryBuilder::new().filter(QueryFilter::eq(key_field, key)).limit(1))
        .await?
        .into_iter()
        .next();
    let Some(stored) = stored else {
        return Ok(None);
    };
    let old_group = stored.group_value();
    if !stored.is_primary() || old_group == record.group_value() {
        return Ok(None);
    }

    session.lock_group(field.filter_on, &old_group).await?;
    let heir = session
        .find(
            siblings_of(field.filter_on, &old_group, record)?
                .order_by(key_field, SortOrder::Asc)
                .limit(1)
                .for_update(),
        )
        .await?
        .into_iter()
        .next();
    let Some(heir) = heir else {
        return Ok(None);
    };
    let Some(heir_key) = heir.key() else {
        return Ok(None);
    };
    let heir_key = key_value::<T>(&heir_key)?;

    session
        .update_where(
            QueryBuilder::new().filter(QueryFilter::eq(key_field, heir_key.clone())),
            UpdateSet::new().set(field.flag, json!(true)),
        )
        .await?;
    tracing::debug!(
        table = T::table_name(),
        group = %old_group,
        heir = %heir_key,
        "primary flag handed over in vacated group"
    );
    Ok(Some(heir_key))
}

/// Runs `resolve_primary_flag` before every save, after handing the flag
/// over in the group a record is leaving
pub struct PrimaryFlagHook<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> PrimaryFlagHook<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for PrimaryFlagHook<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: PrimaryFlagged> SaveHook<T> for PrimaryFlagHook<T> {
    async fn pre_save(
        &self,
        session: &mut dyn StoreSession<T>,
        record: &mut T,
        creating: bool,
    ) -> Result<(), ModelKitError> {
        if !creating {
            promote_in_vacated_group(session, record).await?;
        }
        resolve_primary_flag(session, record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use store_object::{MemoryStore, QueryBuilder, RecordStore};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Phone {
        id: Option<i64>,
        owner: String,
        is_default: bool,
    }

    impl Record for Phone {
        type Key = i64;

        fn table_name() -> &'static str {
            "phones"
        }

        fn key(&self) -> Option<i64> {
            self.id
        }
    }

    impl PrimaryFlagged for Phone {
        const PRIMARY_FLAG: PrimaryFlagField = PrimaryFlagField::new("is_default", "owner");

        fn group_value(&self) -> Value {
            json!(self.owner)
        }

        fn is_primary(&self) -> bool {
            self.is_default
        }

        fn set_primary(&mut self, value: bool) {
            self.is_default = value;
        }
    }

    fn phone(owner: &str, is_default: bool) -> Phone {
        Phone {
            id: None,
            owner: owner.to_string(),
            is_default,
        }
    }

    #[test]
    fn test_on_uses_default_flag_column() {
        let field = PrimaryFlagField::on("person_id");
        assert_eq!(field.flag, "is_primary");
        assert_eq!(field.filter_on, "person_id");
    }

    #[tokio::test]
    async fn test_resolve_with_custom_flag_column() {
        let store = MemoryStore::<Phone>::new();
        let mut session = store.begin().await.unwrap();

        let mut first = phone("ann", false);
        assert!(resolve_primary_flag(&mut *session, &mut first).await.unwrap());
        let first = session.insert(first).await.unwrap();

        let mut second = phone("ann", false);
        assert!(!resolve_primary_flag(&mut *session, &mut second).await.unwrap());
        session.insert(second).await.unwrap();

        let mut other_group = phone("bob", false);
        assert!(resolve_primary_flag(&mut *session, &mut other_group).await.unwrap());
        session.insert(other_group).await.unwrap();

        let mut third = phone("ann", true);
        assert!(resolve_primary_flag(&mut *session, &mut third).await.unwrap());
        session.insert(third).await.unwrap();
        session.commit().await.unwrap();

        let refreshed = store.get_by_key(&first.id.unwrap()).await.unwrap().unwrap();
        assert!(!refreshed.is_default);

        let defaults = store
            .count_where(QueryBuilder::new().filter(QueryFilter::eq("is_default", json!(true))))
            .await
            .unwrap();
        assert_eq!(defaults, 2);
    }
}
