//! Non-overlapping history
//!
//! Records of one group (`history_key`) form a timeline of half-open ranges
//! that must not overlap. Two checks are available through `OverlapPolicy`:
//!
//! * `BoundarySample` rejects a candidate when a sibling is current at the
//!   candidate's begin or at its end. An unbounded side samples "now". A
//!   sibling nested strictly inside the candidate passes this check.
//! * `Intersection` rejects any sibling whose range intersects the candidate.

use crate::errors::ModelKitError;
use crate::model_store::{display_group, siblings_of, SaveHook};
use crate::temporal::{Interval, IntervalFields, Temporal, DATE_BEGIN, DATE_END};
use async_trait::async_trait;
use config::OverlapPolicy;
use serde_json::Value;
use std::marker::PhantomData;
use store_object::{QueryFilter, Record, StoreSession};

/// The grouping column and the range columns of a history record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryFields {
    pub history_key: &'static str,
    pub interval: IntervalFields,
}

impl HistoryFields {
    pub const fn new(history_key: &'static str, interval: IntervalFields) -> Self {
        Self {
            history_key,
            interval,
        }
    }

    /// Grouped by `history_key`, ranging over `date_begin` / `date_end`
    pub const fn on(history_key: &'static str) -> Self {
        Self::new(history_key, IntervalFields::new(DATE_BEGIN, DATE_END))
    }
}

/// A record that is one entry of a per-group timeline
pub trait HistoryRecord: Record {
    type Instant: Temporal;

    const HISTORY: HistoryFields;

    /// Value of the `history_key` column
    fn history_value(&self) -> Value;

    fn interval(&self) -> Interval<Self::Instant>;
}

/// Siblings whose range may intersect `candidate`. Bounds of the candidate
/// that are unbounded drop their term.
fn intersecting<I: Temporal>(fields: IntervalFields, candidate: &Interval<I>) -> QueryFilter {
    let mut terms = Vec::new();
    if let Some(end) = candidate.end {
        terms.push(QueryFilter::or(vec![
            QueryFilter::is_null(fields.begin),
            QueryFilter::lt(fields.begin, end.to_value()),
        ]));
    }
    if let Some(begin) = candidate.begin {
        terms.push(QueryFilter::or(vec![
            QueryFilter::is_null(fields.end),
            QueryFilter::gt(fields.end, begin.to_value()),
        ]));
    }
    QueryFilter::and(terms)
}

/// Check `record` for a consistent range and against its siblings
pub async fn validate_history<T: HistoryRecord>(
    session: &mut dyn StoreSession<T>,
    record: &T,
    policy: OverlapPolicy,
) -> Result<(), ModelKitError> {
    let interval = record.interval();
    interval.check()?;

    let fields = T::HISTORY;
    let group = record.history_value();
    session.lock_group(fields.history_key, &group).await?;
    let siblings = siblings_of(fields.history_key, &group, record)?;

    let overlapping = match policy {
        OverlapPolicy::BoundarySample => {
            let now = T::Instant::now();
            let begin = interval.begin.unwrap_or(now);
            let end = interval.end.unwrap_or(now);

            session
                .exists(siblings.clone().filter(fields.interval.current(begin)))
                .await?
                || session
                    .exists(siblings.filter(fields.interval.current(end)))
                    .await?
        }
        OverlapPolicy::Intersection => {
            if interval.is_empty() {
                false
            } else {
                let candidates = session
                    .find(siblings.filter(intersecting(fields.interval, &interval)).for_update())
                    .await?;
                candidates
                    .iter()
                    .any(|sibling| sibling.interval().overlaps(&interval))
            }
        }
    };

    if overlapping {
        tracing::debug!(
            table = T::table_name(),
            group = %group,
            ?policy,
            "overlapping history rejected"
        );
        return Err(ModelKitError::OverlappingRange {
            table: T::table_name(),
            field: fields.history_key,
            group: display_group(&group),
        });
    }
    Ok(())
}

/// Runs `validate_history` during validation of every save
pub struct HistoryHook<T> {
    policy: OverlapPolicy,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> HistoryHook<T> {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            policy,
            _phantom: PhantomData,
        }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }
}

impl<T> Default for HistoryHook<T> {
    fn default() -> Self {
        Self::new(OverlapPolicy::default())
    }
}

#[async_trait]
impl<T: HistoryRecord> SaveHook<T> for HistoryHook<T> {
    async fn validate(
        &self,
        session: &mut dyn StoreSession<T>,
        record: &T,
    ) -> Result<(), ModelKitError> {
        validate_history(session, record, self.policy).await
    }
}
