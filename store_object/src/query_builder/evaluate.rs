//! In-memory evaluation of query filters against JSON rows
//!
//! Null handling follows SQL: any comparison involving a null field or value
//! is not satisfied, only IS NULL / IS NOT NULL look at nulls.

use crate::query_builder::filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
use crate::query_builder::ordering::SortOrder;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;

impl QueryFilter {
    /// Whether a row (a JSON object) satisfies this filter
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            QueryFilter::Condition(condition) => condition.matches(row),
            QueryFilter::Group { operator, filters } => match operator {
                LogicalOperator::And => filters.iter().all(|f| f.matches(row)),
                LogicalOperator::Or => filters.iter().any(|f| f.matches(row)),
            },
        }
    }
}

impl QueryCondition {
    fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.field).unwrap_or(&Value::Null);

        match self.operator {
            QueryOperator::IsNull => return field.is_null(),
            QueryOperator::IsNotNull => return !field.is_null(),
            _ => {}
        }

        let value = match &self.value {
            Some(value) if !field.is_null() => value,
            _ => return false,
        };

        match self.operator {
            QueryOperator::In => membership(field, value),
            QueryOperator::NotIn => match value {
                Value::Array(items) => !items.iter().any(|item| equal_values(field, item)),
                _ => true,
            },
            QueryOperator::Eq => equal_values(field, value),
            QueryOperator::Ne => !value.is_null() && !equal_values(field, value),
            QueryOperator::Gt => compare_values(field, value) == Some(Ordering::Greater),
            QueryOperator::Gte => matches!(
                compare_values(field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            QueryOperator::Lt => compare_values(field, value) == Some(Ordering::Less),
            QueryOperator::Lte => matches!(
                compare_values(field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            QueryOperator::IsNull | QueryOperator::IsNotNull => unreachable!(),
        }
    }
}

fn membership(field: &Value, value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| equal_values(field, item)),
        _ => false,
    }
}

fn equal_values(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal)
}

/// Compare two JSON scalars the way the database would compare the typed columns.
///
/// Strings holding timestamps or dates are compared chronologically so that
/// differently formatted fractions or offsets still order correctly.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(compare_strings(a, b)),
        _ => None,
    }
}

fn compare_strings(a: &str, b: &str) -> Ordering {
    if let (Ok(a), Ok(b)) = (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (parse_naive_datetime(a), parse_naive_datetime(b)) {
        return a.cmp(&b);
    }
    if let (Ok(a), Ok(b)) = (
        NaiveDate::parse_from_str(a, "%Y-%m-%d"),
        NaiveDate::parse_from_str(b, "%Y-%m-%d"),
    ) {
        return a.cmp(&b);
    }
    a.cmp(b)
}

pub(crate) fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Order rows by the given fields; nulls sort last like PostgreSQL ascending order.
pub fn sort_rows(rows: &mut [Value], order_by: &[(String, SortOrder)]) {
    if order_by.is_empty() {
        return;
    }

    rows.sort_by(|left, right| {
        for (field, order) in order_by {
            let a = left.get(field).unwrap_or(&Value::Null);
            let b = right.get(field).unwrap_or(&Value::Null);

            let ordering = match (a.is_null(), b.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
            };
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
