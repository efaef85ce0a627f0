//! PostgreSQL implementation of `RecordStore`
//!
//! SQL is generated from the query builder; parameters travel as JSON values
//! and are bound with their most specific PostgreSQL type.

use super::core::{check_query_fields, GenericStore};
use super::transaction::PgSession;
use crate::errors::StorehausError;
use crate::query_builder::evaluate::parse_naive_datetime;
use crate::query_builder::sql_generation::SqlGenerator;
use crate::query_builder::{QueryBuilder, UpdateSet};
use crate::traits::{key_value, Record, RecordStore, StoreSession};
use crate::validation::ValidatedFieldName;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};

// Shared parameter binding logic for query and query_as
macro_rules! bind_json_param {
    ($query:expr, $param:expr) => {
        match $param {
            serde_json::Value::String(s) => {
                // Timestamps, dates and UUIDs must reach PostgreSQL typed,
                // text parameters do not compare against those columns
                if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&s) {
                    $query.bind(dt.with_timezone(&chrono::Utc))
                } else if let Some(naive) = parse_naive_datetime(&s) {
                    $query.bind(naive)
                } else if let Ok(date) = chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                    $query.bind(date)
                } else if let Ok(uuid) = uuid::Uuid::parse_str(&s) {
                    $query.bind(uuid)
                } else {
                    $query.bind(s)
                }
            }
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                        $query.bind(i as i32)
                    } else {
                        $query.bind(i)
                    }
                } else if let Some(f) = n.as_f64() {
                    $query.bind(f)
                } else {
                    $query.bind(n.to_string())
                }
            }
            serde_json::Value::Bool(b) => $query.bind(b),
            serde_json::Value::Null => $query.bind(Option::<String>::None),
            other => $query.bind(sqlx::types::Json(other)),
        }
    };
}

pub(crate) fn select_sql<T: Record>(
    query: &QueryBuilder,
) -> Result<(String, Vec<Value>), StorehausError> {
    check_query_fields(query)?;
    let (where_clause, order_clause, limit_clause, params) = query.build();

    let mut sql = format!("SELECT * FROM {}", T::table_name());
    for clause in [
        where_clause.as_str(),
        order_clause.as_str(),
        limit_clause.as_str(),
        query.build_lock_clause(),
    ] {
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(clause);
        }
    }

    Ok((sql, params))
}

pub(crate) fn count_sql<T: Record>(
    query: &QueryBuilder,
) -> Result<(String, Vec<Value>), StorehausError> {
    check_query_fields(query)?;
    let (where_clause, params) = query.build_where_clause(); // No ORDER BY or LIMIT for COUNT

    let mut sql = format!("SELECT COUNT(*) AS total FROM {}", T::table_name());
    if !where_clause.is_empty() {
        sql.push(' ');
        sql.push_str(&where_clause);
    }

    Ok((sql, params))
}

/// INSERT for the non-null columns of a record; null columns fall back to
/// their database default
pub(crate) fn insert_sql<T: Record>(record: &T) -> Result<(String, Vec<Value>), StorehausError> {
    let mut assigned: Vec<(String, Value)> = match record.to_row()? {
        Value::Object(map) => map.into_iter().filter(|(_, value)| !value.is_null()).collect(),
        _ => Vec::new(),
    };
    assigned.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut columns = Vec::with_capacity(assigned.len());
    let mut params = Vec::with_capacity(assigned.len());
    for (column, value) in assigned {
        ValidatedFieldName::new(&column)?;
        columns.push(column);
        params.push(value);
    }

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", T::table_name())
    } else {
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            T::table_name(),
            columns.join(", "),
            placeholders.join(", ")
        )
    };

    Ok((sql, params))
}

/// UPDATE of every column except the primary key, matched by key
pub(crate) fn update_sql<T: Record>(record: &T) -> Result<(String, Vec<Value>), StorehausError> {
    let key = record.key().ok_or_else(|| {
        StorehausError::NotFound(format!("{} record without a key", T::table_name()))
    })?;

    let mut updates = UpdateSet::new();
    if let Value::Object(map) = record.to_row()? {
        for (column, value) in map {
            if column == T::primary_key_field() {
                continue;
            }
            ValidatedFieldName::new(&column)?;
            updates = updates.set(column, value);
        }
    }

    let (set_clause, mut params) = SqlGenerator::build_set_clause(&updates);
    params.push(key_value::<T>(&key)?);

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING *",
        T::table_name(),
        set_clause,
        T::primary_key_field(),
        params.len()
    );

    Ok((sql, params))
}

/// Bulk UPDATE; SET parameters come first, WHERE parameters are numbered after them
pub(crate) fn update_where_sql<T: Record>(
    query: &QueryBuilder,
    updates: &UpdateSet,
) -> Result<(String, Vec<Value>), StorehausError> {
    check_query_fields(query)?;
    for (field, _) in updates.assignments() {
        ValidatedFieldName::new(field)?;
    }

    let (set_clause, mut params) = SqlGenerator::build_set_clause(updates);
    let (where_clause, where_params) =
        SqlGenerator::build_where_clause_from(query.conditions(), params.len() + 1);
    params.extend(where_params);

    let mut sql = format!("UPDATE {} SET {}", T::table_name(), set_clause);
    if !where_clause.is_empty() {
        sql.push(' ');
        sql.push_str(&where_clause);
    }

    Ok((sql, params))
}

pub(crate) async fn fetch_records<'e, T, E>(
    executor: E,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<T>, StorehausError>
where
    T: Record + for<'r> sqlx::FromRow<'r, PgRow>,
    E: sqlx::Executor<'e, Database = Postgres>,
{
    crate::debug_log!("[FETCH] {} ({} params)", sql, params.len());

    let mut query = sqlx::query_as::<_, T>(sql);
    for param in params {
        query = bind_json_param!(query, param);
    }

    query
        .fetch_all(executor)
        .await
        .map_err(|e| StorehausError::query_execution(T::table_name(), sql, e))
}

pub(crate) async fn fetch_optional_record<'e, T, E>(
    executor: E,
    sql: &str,
    params: Vec<Value>,
) -> Result<Option<T>, StorehausError>
where
    T: Record + for<'r> sqlx::FromRow<'r, PgRow>,
    E: sqlx::Executor<'e, Database = Postgres>,
{
    crate::debug_log!("[FETCH_ONE] {} ({} params)", sql, params.len());

    let mut query = sqlx::query_as::<_, T>(sql);
    for param in params {
        query = bind_json_param!(query, param);
    }

    query
        .fetch_optional(executor)
        .await
        .map_err(|e| StorehausError::query_execution(T::table_name(), sql, e))
}

pub(crate) async fn fetch_total<'e, T, E>(
    executor: E,
    sql: &str,
    params: Vec<Value>,
) -> Result<i64, StorehausError>
where
    T: Record,
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_json_param!(query, param);
    }

    let row = query
        .fetch_one(executor)
        .await
        .map_err(|e| StorehausError::query_execution(T::table_name(), sql, e))?;

    row.try_get::<i64, _>("total")
        .map_err(|e| StorehausError::database_operation(T::table_name(), "count", e))
}

pub(crate) async fn execute<'e, T, E>(
    executor: E,
    sql: &str,
    params: Vec<Value>,
) -> Result<u64, StorehausError>
where
    T: Record,
    E: sqlx::Executor<'e, Database = Postgres>,
{
    crate::debug_log!("[EXECUTE] {} ({} params)", sql, params.len());

    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_json_param!(query, param);
    }

    let result = query
        .execute(executor)
        .await
        .map_err(|e| StorehausError::query_execution(T::table_name(), sql, e))?;

    Ok(result.rows_affected())
}

#[async_trait]
impl<T> RecordStore<T> for GenericStore<T>
where
    T: Record + for<'r> sqlx::FromRow<'r, PgRow>,
{
    async fn begin(&self) -> Result<Box<dyn StoreSession<T> + '_>, StorehausError> {
        let tx = self
            .db_pool
            .begin()
            .await
            .map_err(|e| StorehausError::database_operation(T::table_name(), "begin", e))?;
        Ok(Box::new(PgSession::<T>::new(tx)))
    }

    async fn find(&self, query: QueryBuilder) -> Result<Vec<T>, StorehausError> {
        let (sql, params) = select_sql::<T>(&query)?;
        fetch_records(&self.db_pool, &sql, params).await
    }

    async fn count_where(&self, query: QueryBuilder) -> Result<i64, StorehausError> {
        let (sql, params) = count_sql::<T>(&query)?;
        fetch_total::<T, _>(&self.db_pool, &sql, params).await
    }
}
