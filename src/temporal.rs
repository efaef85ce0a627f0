//! Temporal ranges
//!
//! Records carrying an optional begin/end pair are valid on the half-open
//! range `[begin, end)`. A missing begin means "since forever" and a missing
//! end means "until further notice".
//!
//! ```rust
//! use chrono::NaiveDate;
//! use modelkit::temporal::{CoreQueryExt, IntervalFields};
//! use store_object::QueryBuilder;
//!
//! let as_of = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
//! let query = QueryBuilder::new()
//!     .active()
//!     .current(IntervalFields::default(), Some(as_of));
//!
//! let (where_clause, _) = query.build_where_clause();
//! assert!(where_clause.contains("date_begin <= $2"));
//! ```

use crate::errors::ModelKitError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::{Debug, Display};
use store_object::{QueryBuilder, QueryFilter, Record, RecordStore};

pub const DATE_BEGIN: &str = "date_begin";
pub const DATE_END: &str = "date_end";

/// An instant type usable as an interval bound
pub trait Temporal:
    Copy + Ord + Debug + Display + Send + Sync + Serialize + 'static
{
    /// The current instant, used when no reference instant is given
    fn now() -> Self;

    /// The JSON form used in query parameters
    fn to_value(&self) -> Value;
}

impl Temporal for NaiveDate {
    fn now() -> Self {
        Utc::now().date_naive()
    }

    fn to_value(&self) -> Value {
        Value::String(self.format("%Y-%m-%d").to_string())
    }
}

impl Temporal for NaiveDateTime {
    fn now() -> Self {
        Utc::now().naive_utc()
    }

    fn to_value(&self) -> Value {
        Value::String(self.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

impl Temporal for DateTime<Utc> {
    fn now() -> Self {
        Utc::now()
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_rfc3339())
    }
}

/// Which columns hold the begin and end of a record's range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalFields {
    pub begin: &'static str,
    pub end: &'static str,
}

impl IntervalFields {
    pub const fn new(begin: &'static str, end: &'static str) -> Self {
        Self { begin, end }
    }

    /// `(begin IS NULL OR begin <= as_of) AND (end IS NULL OR end > as_of)`
    pub fn current<I: Temporal>(&self, as_of: I) -> QueryFilter {
        let as_of = as_of.to_value();
        QueryFilter::and(vec![
            QueryFilter::or(vec![
                QueryFilter::is_null(self.begin),
                QueryFilter::lte(self.begin, as_of.clone()),
            ]),
            QueryFilter::or(vec![
                QueryFilter::is_null(self.end),
                QueryFilter::gt(self.end, as_of),
            ]),
        ])
    }

    /// Ranges that ended on or before `as_of`
    pub fn past<I: Temporal>(&self, as_of: I) -> QueryFilter {
        QueryFilter::and(vec![
            QueryFilter::is_not_null(self.end),
            QueryFilter::lte(self.end, as_of.to_value()),
        ])
    }

    /// Ranges that begin after `as_of`
    pub fn future<I: Temporal>(&self, as_of: I) -> QueryFilter {
        QueryFilter::and(vec![
            QueryFilter::is_not_null(self.begin),
            QueryFilter::gt(self.begin, as_of.to_value()),
        ])
    }
}

impl Default for IntervalFields {
    fn default() -> Self {
        Self::new(DATE_BEGIN, DATE_END)
    }
}

/// A half-open range with optional bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval<I: Temporal> {
    pub begin: Option<I>,
    pub end: Option<I>,
}

impl<I: Temporal> Interval<I> {
    pub fn new(begin: Option<I>, end: Option<I>) -> Self {
        Self { begin, end }
    }

    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    /// Fails when the end comes before the begin
    pub fn check(&self) -> Result<(), ModelKitError> {
        match (self.begin, self.end) {
            (Some(begin), Some(end)) if end < begin => Err(ModelKitError::InvalidRange {
                begin: begin.to_string(),
                end: end.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// A range whose begin equals its end contains no instant
    pub fn is_empty(&self) -> bool {
        matches!((self.begin, self.end), (Some(begin), Some(end)) if end <= begin)
    }

    pub fn contains(&self, as_of: I) -> bool {
        self.begin.is_none_or(|begin| begin <= as_of) && self.end.is_none_or(|end| end > as_of)
    }

    pub fn has_ended(&self, as_of: I) -> bool {
        self.end.is_some_and(|end| end <= as_of)
    }

    pub fn has_not_begun(&self, as_of: I) -> bool {
        self.begin.is_some_and(|begin| begin > as_of)
    }

    /// True intersection of the half-open ranges
    pub fn overlaps(&self, other: &Interval<I>) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let starts_before_other_ends = match (self.begin, other.end) {
            (Some(begin), Some(end)) => begin < end,
            _ => true,
        };
        let other_starts_before_end = match (other.begin, self.end) {
            (Some(begin), Some(end)) => begin < end,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_end
    }
}

impl<I: Temporal> Default for Interval<I> {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Conventional filters on top of `QueryBuilder`
pub trait CoreQueryExt: Sized {
    fn flag(self, field: &str, value: bool) -> Self;

    /// Only objects with `is_published = true`
    fn published(self) -> Self {
        self.flag("is_published", true)
    }

    fn unpublished(self) -> Self {
        self.flag("is_published", false)
    }

    /// Only objects with `is_valid = true`
    fn valid(self) -> Self {
        self.flag("is_valid", true)
    }

    fn invalid(self) -> Self {
        self.flag("is_valid", false)
    }

    /// Only objects with `is_active = true`
    fn active(self) -> Self {
        self.flag("is_active", true)
    }

    fn inactive(self) -> Self {
        self.flag("is_active", false)
    }

    /// Objects whose range contains `as_of` (now when `None`)
    fn current<I: Temporal>(self, fields: IntervalFields, as_of: Option<I>) -> Self;

    /// Objects that have ended as of `as_of` (now when `None`)
    fn past<I: Temporal>(self, fields: IntervalFields, as_of: Option<I>) -> Self;

    /// Objects that have not begun as of `as_of` (now when `None`)
    fn future<I: Temporal>(self, fields: IntervalFields, as_of: Option<I>) -> Self;
}

impl CoreQueryExt for QueryBuilder {
    fn flag(self, field: &str, value: bool) -> Self {
        self.filter(QueryFilter::eq(field, json!(value)))
    }

    fn current<I: Temporal>(self, fields: IntervalFields, as_of: Option<I>) -> Self {
        self.filter(fields.current(as_of.unwrap_or_else(I::now)))
    }

    fn past<I: Temporal>(self, fields: IntervalFields, as_of: Option<I>) -> Self {
        self.filter(fields.past(as_of.unwrap_or_else(I::now)))
    }

    fn future<I: Temporal>(self, fields: IntervalFields, as_of: Option<I>) -> Self {
        self.filter(fields.future(as_of.unwrap_or_else(I::now)))
    }
}

/// Point-in-time lookups available on every store
#[async_trait]
pub trait TemporalStore<T: Record>: RecordStore<T> {
    /// The single record of `query` that is current as of `as_of` (now when
    /// `None`). Assumes ranges in the queried set do not overlap.
    async fn get_current<I: Temporal>(
        &self,
        query: QueryBuilder,
        fields: IntervalFields,
        as_of: Option<I>,
    ) -> Result<T, ModelKitError> {
        let as_of = as_of.unwrap_or_else(I::now);
        let current = query.current(fields, Some(as_of));

        let mut found = self.find(current.clone().limit(2)).await?;
        match found.len() {
            0 => Err(ModelKitError::NotFound {
                table: T::table_name(),
                as_of: as_of.to_string(),
            }),
            1 => Ok(found.remove(0)),
            _ => {
                let count = self.count_where(current).await?;
                Err(ModelKitError::MultipleResults {
                    table: T::table_name(),
                    as_of: as_of.to_string(),
                    count: count as usize,
                })
            }
        }
    }
}

impl<T: Record, S: RecordStore<T> + ?Sized> TemporalStore<T> for S {}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unbounded_interval_contains_everything() {
        let interval = Interval::<NaiveDate>::unbounded();
        for as_of in [date(1, 1, 1), date(2020, 6, 1), date(9999, 12, 31)] {
            assert!(interval.contains(as_of));
            assert!(!interval.has_ended(as_of));
            assert!(!interval.has_not_begun(as_of));
        }
    }

    #[test]
    fn test_contains_is_inclusive_at_begin_exclusive_at_end() {
        let interval = Interval::new(Some(date(2020, 1, 1)), Some(date(2020, 1, 2)));
        assert!(interval.contains(date(2020, 1, 1)));
        assert!(!interval.contains(date(2020, 1, 2)));
        assert!(!interval.contains(date(2019, 12, 31)));
        assert!(interval.has_ended(date(2020, 1, 2)));
        assert!(interval.has_not_begun(date(2019, 12, 31)));
    }

    #[test]
    fn test_check_rejects_end_before_begin() {
        let interval = Interval::new(Some(date(2020, 2, 1)), Some(date(2020, 1, 1)));
        match interval.check() {
            Err(ModelKitError::InvalidRange { begin, end }) => {
                assert_eq!(begin, "2020-02-01");
                assert_eq!(end, "2020-01-01");
            }
            other => panic!("Expected InvalidRange, got {:?}", other),
        }

        assert!(Interval::new(Some(date(2020, 1, 1)), Some(date(2020, 1, 1))).check().is_ok());
        assert!(Interval::new(None, Some(date(2020, 1, 1))).check().is_ok());
    }

    #[test]
    fn test_overlaps() {
        let first = Interval::new(Some(date(2020, 1, 1)), Some(date(2020, 6, 1)));
        let adjacent = Interval::new(Some(date(2020, 6, 1)), Some(date(2020, 9, 1)));
        let straddling = Interval::new(Some(date(2020, 3, 1)), Some(date(2020, 9, 1)));
        let nested = Interval::new(Some(date(2020, 2, 1)), Some(date(2020, 3, 1)));
        let open_ended = Interval::new(Some(date(2020, 5, 31)), None);

        assert!(!first.overlaps(&adjacent));
        assert!(!adjacent.overlaps(&first));
        assert!(first.overlaps(&straddling));
        assert!(first.overlaps(&nested));
        assert!(nested.overlaps(&first));
        assert!(first.overlaps(&open_ended));
        assert!(Interval::unbounded().overlaps(&first));
    }

    #[test]
    fn test_empty_interval_overlaps_nothing() {
        let empty = Interval::new(Some(date(2020, 3, 1)), Some(date(2020, 3, 1)));
        assert!(empty.is_empty());
        assert!(!empty.overlaps(&Interval::unbounded()));
    }

    #[test]
    fn test_custom_fields_past_and_future_sql() {
        let fields = IntervalFields::new("valid_from", "valid_to");
        let as_of = date(2021, 7, 4);

        let (where_clause, values) = QueryBuilder::new()
            .past(fields, Some(as_of))
            .build_where_clause();
        assert_eq!(where_clause, "WHERE (valid_to IS NOT NULL AND valid_to <= $1)");
        assert_eq!(values, vec![json!("2021-07-04")]);

        let (where_clause, _) = QueryBuilder::new()
            .future(fields, Some(as_of))
            .build_where_clause();
        assert_eq!(where_clause, "WHERE (valid_from IS NOT NULL AND valid_from > $1)");
    }

    #[test]
    fn test_flag_filters() {
        let (where_clause, values) = QueryBuilder::new()
            .published()
            .inactive()
            .valid()
            .build_where_clause();
        assert_eq!(
            where_clause,
            "WHERE is_published = $1 AND is_active = $2 AND is_valid = $3"
        );
        assert_eq!(values, vec![json!(true), json!(false), json!(true)]);
    }

    #[test]
    fn test_timestamp_values_round_trip_through_filters() {
        let as_of = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let filter = IntervalFields::default().current(as_of);
        let row = json!({ "date_begin": "2024-05-01T10:00:00Z", "date_end": null });
        assert!(filter.matches(&row));
    }
}
