use chrono::NaiveDate;
use modelkit::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Membership {
    id: Option<i64>,
    group_code: String,
    date_begin: Option<NaiveDate>,
    date_end: Option<NaiveDate>,
    is_primary: bool,
}

impl Record for Membership {
    type Key = i64;

    fn table_name() -> &'static str {
        "memberships"
    }

    fn key(&self) -> Option<i64> {
        self.id
    }
}

impl PrimaryFlagged for Membership {
    const PRIMARY_FLAG: PrimaryFlagField = PrimaryFlagField::on("group_code");

    fn group_value(&self) -> Value {
        json!(self.group_code)
    }

    fn is_primary(&self) -> bool {
        self.is_primary
    }

    fn set_primary(&mut self, value: bool) {
        self.is_primary = value;
    }
}

impl HistoryRecord for Membership {
    type Instant = NaiveDate;

    const HISTORY: HistoryFields = HistoryFields::on("group_code");

    fn history_value(&self) -> Value {
        json!(self.group_code)
    }

    fn interval(&self) -> Interval<NaiveDate> {
        Interval::new(self.date_begin, self.date_end)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn membership(
    group: &str,
    begin: Option<NaiveDate>,
    end: Option<NaiveDate>,
    is_primary: bool,
) -> Membership {
    Membership {
        id: None,
        group_code: group.to_string(),
        date_begin: begin,
        date_end: end,
        is_primary,
    }
}

fn models(policy: OverlapPolicy) -> ModelStore<Membership, MemoryStore<Membership>> {
    ModelStore::new(MemoryStore::new())
        .with_hook(HistoryHook::new(policy))
        .with_hook(PrimaryFlagHook::new())
}

async fn primaries(
    models: &ModelStore<Membership, MemoryStore<Membership>>,
    group: &str,
) -> Vec<Membership> {
    models
        .find(
            QueryBuilder::new()
                .filter(QueryFilter::eq("group_code", json!(group)))
                .filter(QueryFilter::eq("is_primary", json!(true))),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_worked_example_group_a() {
    let models = models(OverlapPolicy::BoundarySample);

    let first = models
        .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), true))
        .await
        .unwrap();
    assert!(first.is_primary);

    let straddling = models
        .save(membership("A", Some(date(2020, 3, 1)), Some(date(2020, 9, 1)), false))
        .await;
    match straddling {
        Err(ModelKitError::OverlappingRange { table, field, group }) => {
            assert_eq!(table, "memberships");
            assert_eq!(field, "group_code");
            assert_eq!(group, "A");
        }
        other => panic!("Expected OverlappingRange, got {:?}", other),
    }

    let second = models
        .save(membership("A", Some(date(2020, 6, 1)), Some(date(2020, 9, 1)), true))
        .await
        .unwrap();
    assert!(second.is_primary);

    let first = models.get_by_key(&first.id.unwrap()).await.unwrap().unwrap();
    assert!(!first.is_primary);
    assert_eq!(primaries(&models, "A").await, vec![second]);
}

#[tokio::test]
async fn test_invalid_range_is_rejected() {
    let models = models(OverlapPolicy::BoundarySample);
    let result = models
        .save(membership("A", Some(date(2020, 2, 1)), Some(date(2020, 1, 1)), false))
        .await;

    match result {
        Err(e @ ModelKitError::InvalidRange { .. }) => assert!(e.is_validation()),
        other => panic!("Expected InvalidRange, got {:?}", other),
    }
    assert!(models.store().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lone_record_is_flagged() {
    let models = models(OverlapPolicy::BoundarySample);
    let saved = models
        .save(membership("solo", Some(date(2021, 1, 1)), Some(date(2021, 2, 1)), false))
        .await
        .unwrap();
    assert!(saved.is_primary);

    let second = models
        .save(membership("solo", Some(date(2021, 2, 1)), Some(date(2021, 3, 1)), false))
        .await
        .unwrap();
    assert!(!second.is_primary);
    assert_eq!(primaries(&models, "solo").await.len(), 1);
}

#[tokio::test]
async fn test_groups_are_independent() {
    let models = models(OverlapPolicy::Intersection);
    let range = (Some(date(2020, 1, 1)), Some(date(2021, 1, 1)));

    for group in ["A", "B", "C"] {
        let saved = models.save(membership(group, range.0, range.1, true)).await.unwrap();
        assert!(saved.is_primary);
    }
    for group in ["A", "B", "C"] {
        assert_eq!(primaries(&models, group).await.len(), 1);
    }
}

#[tokio::test]
async fn test_at_most_one_primary_after_every_write() {
    let models = models(OverlapPolicy::Intersection);
    let mut saved = Vec::new();

    for (i, flag) in [false, true, false, true, true, false].into_iter().enumerate() {
        let year = 2000 + i as i32;
        let record = models
            .save(membership("G", Some(date(year, 1, 1)), Some(date(year + 1, 1, 1)), flag))
            .await
            .unwrap();
        saved.push(record);
        assert_eq!(primaries(&models, "G").await.len(), 1);
    }

    // Re-saving a non-primary sibling as primary moves the flag to it
    let mut oldest = models.get_by_key(&saved[0].id.unwrap()).await.unwrap().unwrap();
    assert!(!oldest.is_primary);
    oldest.is_primary = true;
    let oldest = models.save(oldest).await.unwrap();

    assert_eq!(primaries(&models, "G").await, vec![oldest]);
}

#[tokio::test]
async fn test_nested_sibling_depends_on_policy() {
    let existing = membership("A", Some(date(2020, 3, 1)), Some(date(2020, 4, 1)), false);
    let enclosing = membership("A", Some(date(2020, 1, 1)), Some(date(2020, 12, 1)), false);

    let legacy = models(OverlapPolicy::BoundarySample);
    legacy.save(existing.clone()).await.unwrap();
    assert!(legacy.save(enclosing.clone()).await.is_ok());

    let strict = models(OverlapPolicy::Intersection);
    strict.save(existing).await.unwrap();
    assert!(matches!(
        strict.save(enclosing).await,
        Err(ModelKitError::OverlappingRange { .. })
    ));
}

#[tokio::test]
async fn test_boundary_sample_rejects_range_ending_where_sibling_begins() {
    let later = membership("A", Some(date(2020, 6, 1)), Some(date(2020, 9, 1)), false);
    let earlier = membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), false);

    // The end instant is sampled, and the later sibling is current at it
    let legacy = models(OverlapPolicy::BoundarySample);
    legacy.save(later.clone()).await.unwrap();
    assert!(matches!(
        legacy.save(earlier.clone()).await,
        Err(ModelKitError::OverlappingRange { .. })
    ));

    let strict = models(OverlapPolicy::Intersection);
    strict.save(later).await.unwrap();
    assert!(strict.save(earlier).await.is_ok());
}

#[tokio::test]
async fn test_intersection_accepts_adjacent_and_empty_ranges() {
    let models = models(OverlapPolicy::Intersection);
    models
        .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), false))
        .await
        .unwrap();

    models
        .save(membership("A", None, Some(date(2020, 1, 1)), false))
        .await
        .unwrap();
    models
        .save(membership("A", Some(date(2020, 6, 1)), None, false))
        .await
        .unwrap();

    // Empty ranges contain no instant
    models
        .save(membership("A", Some(date(2020, 3, 1)), Some(date(2020, 3, 1)), false))
        .await
        .unwrap();

    assert!(models
        .save(membership("A", Some(date(2025, 1, 1)), None, false))
        .await
        .is_err());
}

#[tokio::test]
async fn test_boundary_inside_sibling_is_rejected_by_both_policies() {
    for policy in [OverlapPolicy::BoundarySample, OverlapPolicy::Intersection] {
        let models = models(policy);
        models
            .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), false))
            .await
            .unwrap();

        let begins_inside = membership("A", Some(date(2020, 5, 31)), Some(date(2020, 7, 1)), false);
        let ends_inside = membership("A", Some(date(2019, 7, 1)), Some(date(2020, 1, 2)), false);
        assert!(models.save(begins_inside).await.is_err(), "{:?}", policy);
        assert!(models.save(ends_inside).await.is_err(), "{:?}", policy);
    }
}

#[tokio::test]
async fn test_moving_primary_out_of_group_promotes_remaining_member() {
    let models = models(OverlapPolicy::Intersection);
    let mut moved = models
        .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), false))
        .await
        .unwrap();
    let left_behind = models
        .save(membership("A", Some(date(2020, 6, 1)), Some(date(2020, 9, 1)), false))
        .await
        .unwrap();
    assert!(moved.is_primary);
    assert!(!left_behind.is_primary);

    moved.group_code = "B".to_string();
    let moved = models.save(moved).await.unwrap();
    assert!(moved.is_primary);

    let group_a = primaries(&models, "A").await;
    assert_eq!(group_a.len(), 1);
    assert_eq!(group_a[0].id, left_behind.id);
    assert_eq!(primaries(&models, "B").await, vec![moved]);
}

#[tokio::test]
async fn test_moving_non_primary_leaves_old_group_alone() {
    let models = models(OverlapPolicy::Intersection);
    let primary = models
        .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), false))
        .await
        .unwrap();
    let mut moved = models
        .save(membership("A", Some(date(2020, 6, 1)), Some(date(2020, 9, 1)), false))
        .await
        .unwrap();

    moved.group_code = "B".to_string();
    let moved = models.save(moved).await.unwrap();

    // Alone in its new group, so it is flagged there
    assert!(moved.is_primary);
    assert_eq!(primaries(&models, "A").await, vec![primary]);
}

#[tokio::test]
async fn test_update_does_not_overlap_itself() {
    let models = models(OverlapPolicy::BoundarySample);
    let mut record = models
        .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), false))
        .await
        .unwrap();

    record.date_end = Some(date(2020, 5, 1));
    let updated = models.save(record).await.unwrap();

    assert_eq!(updated.date_end, Some(date(2020, 5, 1)));
    assert!(updated.is_primary);
    assert_eq!(models.count_where(QueryBuilder::new()).await.unwrap(), 1);
}

struct Refuse;

#[async_trait]
impl SaveHook<Membership> for Refuse {
    async fn pre_save(
        &self,
        _session: &mut dyn StoreSession<Membership>,
        _record: &mut Membership,
        _creating: bool,
    ) -> Result<(), ModelKitError> {
        Err(StorehausError::Conflict("refused".to_string()).into())
    }
}

#[tokio::test]
async fn test_failed_save_rolls_back_cascade() {
    let store = MemoryStore::<Membership>::new();
    let plain = ModelStore::new(store.clone()).with_hook(PrimaryFlagHook::new());
    let first = plain
        .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), false))
        .await
        .unwrap();
    assert!(first.is_primary);

    let refusing = ModelStore::new(store.clone())
        .with_hook(PrimaryFlagHook::new())
        .with_hook(Refuse);
    let result = refusing
        .save(membership("A", Some(date(2020, 6, 1)), None, true))
        .await;
    assert!(matches!(result, Err(ModelKitError::Store(StorehausError::Conflict(_)))));

    let rows = store.all().await.unwrap();
    assert_eq!(rows, vec![first]);
}

#[tokio::test]
async fn test_concurrent_flagged_saves_leave_one_primary() {
    let models = Arc::new(models(OverlapPolicy::Intersection));
    let mut handles = Vec::new();

    for i in 0..8 {
        let models = Arc::clone(&models);
        handles.push(tokio::spawn(async move {
            let year = 2000 + i;
            models
                .save(membership("race", Some(date(year, 1, 1)), Some(date(year + 1, 1, 1)), true))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(models.count_where(QueryBuilder::new()).await.unwrap(), 8);
    assert_eq!(primaries(&models, "race").await.len(), 1);
}

#[tokio::test]
async fn test_get_current() {
    let models = models(OverlapPolicy::BoundarySample);
    let fields = IntervalFields::default();
    let group_a = || QueryBuilder::new().filter(QueryFilter::eq("group_code", json!("A")));

    models
        .save(membership("A", Some(date(2020, 1, 1)), Some(date(2020, 6, 1)), true))
        .await
        .unwrap();
    let second = models
        .save(membership("A", Some(date(2020, 6, 1)), Some(date(2020, 9, 1)), false))
        .await
        .unwrap();

    let current = models
        .get_current(group_a(), fields, Some(date(2020, 6, 1)))
        .await
        .unwrap();
    assert_eq!(current, second);

    assert!(matches!(
        models.get_current(group_a(), fields, Some(date(2020, 9, 1))).await,
        Err(ModelKitError::NotFound { .. })
    ));

    // Bypass the hooks to plant an overlapping row
    let mut session = models.store().begin().await.unwrap();
    session
        .insert(membership("A", None, None, false))
        .await
        .unwrap();
    session.commit().await.unwrap();

    match models.get_current(group_a(), fields, Some(date(2020, 7, 1))).await {
        Err(ModelKitError::MultipleResults { count, as_of, .. }) => {
            assert_eq!(count, 2);
            assert_eq!(as_of, "2020-07-01");
        }
        other => panic!("Expected MultipleResults, got {:?}", other),
    }
}

#[tokio::test]
async fn test_current_past_future_partition() {
    let models = models(OverlapPolicy::Intersection);
    let fields = IntervalFields::default();
    for (begin, end) in [
        (None, Some(date(2020, 1, 1))),
        (Some(date(2020, 1, 1)), Some(date(2020, 2, 1))),
        (Some(date(2020, 2, 1)), None),
    ] {
        models.save(membership("A", begin, end, false)).await.unwrap();
    }

    let as_of = Some(date(2020, 1, 15));
    let count = |query: QueryBuilder| {
        let models = &models;
        async move { models.count_where(query).await.unwrap() }
    };

    assert_eq!(count(QueryBuilder::new().current(fields, as_of)).await, 1);
    assert_eq!(count(QueryBuilder::new().past(fields, as_of)).await, 1);
    assert_eq!(count(QueryBuilder::new().future(fields, as_of)).await, 1);

    // Exactly at a boundary the later range is current and the earlier one is past
    let boundary = Some(date(2020, 2, 1));
    let current = models
        .find(QueryBuilder::new().current(fields, boundary))
        .await
        .unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].date_begin, Some(date(2020, 2, 1)));
    assert_eq!(count(QueryBuilder::new().past(fields, boundary)).await, 2);
}
