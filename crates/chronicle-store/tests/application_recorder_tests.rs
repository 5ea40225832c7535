//! Integration tests for `ApplicationRecorder` over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chronicle_core::error::RecorderError;
use chronicle_core::event::{Notification, StoredEvent};
use chronicle_core::recorder::{EventRecorder, NotificationRecorder};
use chronicle_core::store::{PartitionStore, StoreError, StorePage, StoreQuery, StoreRecord};
use chronicle_store::ApplicationRecorder;
use chronicle_test_support::MemoryPartitionStore;
use uuid::Uuid;

fn make_event(originator_id: Uuid, originator_version: i64, topic: &str) -> StoredEvent {
    StoredEvent::new(
        originator_id,
        originator_version,
        topic,
        format!("payload-{originator_version}").into_bytes(),
    )
}

fn ids(notifications: &[Notification]) -> Vec<i64> {
    notifications.iter().map(|n| n.id).collect()
}

/// Delegates to an in-memory store, but conditional puts against partitions
/// starting with `prefix` fail while the outage flag is raised.
struct PartitionOutageStore {
    inner: MemoryPartitionStore,
    prefix: &'static str,
    outage: AtomicBool,
}

impl PartitionOutageStore {
    fn new(prefix: &'static str) -> Self {
        Self {
            inner: MemoryPartitionStore::new("events"),
            prefix,
            outage: AtomicBool::new(true),
        }
    }

    fn restore(&self) {
        self.outage.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl PartitionStore for PartitionOutageStore {
    fn store_id(&self) -> &str {
        self.inner.store_id()
    }

    async fn conditional_put(&self, record: StoreRecord) -> Result<(), StoreError> {
        if self.outage.load(Ordering::SeqCst) && record.partition_key.starts_with(self.prefix) {
            return Err(StoreError::Unavailable {
                store: self.store_id().to_string(),
                message: "socket closed".to_string(),
            });
        }
        self.inner.conditional_put(record).await
    }

    async fn batch_put(&self, records: Vec<StoreRecord>) -> Result<(), StoreError> {
        self.inner.batch_put(records).await
    }

    async fn query(&self, query: StoreQuery) -> Result<StorePage, StoreError> {
        self.inner.query(query).await
    }
}

/// A store where every claim against the notification log loses to a phantom
/// concurrent writer.
struct ContestedLogStore {
    inner: MemoryPartitionStore,
    lost_claims: AtomicU32,
}

impl ContestedLogStore {
    fn new() -> Self {
        Self {
            inner: MemoryPartitionStore::new("events"),
            lost_claims: AtomicU32::new(0),
        }
    }

    fn lost_claims(&self) -> u32 {
        self.lost_claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartitionStore for ContestedLogStore {
    fn store_id(&self) -> &str {
        self.inner.store_id()
    }

    async fn conditional_put(&self, record: StoreRecord) -> Result<(), StoreError> {
        if record.partition_key == "$notifications" {
            self.lost_claims.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::AlreadyExists {
                partition_key: record.partition_key,
                sort_key: record.sort_key,
            });
        }
        self.inner.conditional_put(record).await
    }

    async fn batch_put(&self, records: Vec<StoreRecord>) -> Result<(), StoreError> {
        self.inner.batch_put(records).await
    }

    async fn query(&self, query: StoreQuery) -> Result<StorePage, StoreError> {
        self.inner.query(query).await
    }
}

// --- notification assignment ---

#[tokio::test]
async fn test_max_notification_id_is_none_before_any_insert() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    assert_eq!(recorder.max_notification_id().await.unwrap(), None);
}

#[tokio::test]
async fn test_ids_are_assigned_in_insertion_order_across_aggregates() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    let agg_a = Uuid::new_v4();
    let agg_b = Uuid::new_v4();

    recorder
        .insert_events(&[make_event(agg_a, 1, "t1"), make_event(agg_a, 2, "t1")])
        .await
        .unwrap();
    recorder.insert_events(&[make_event(agg_b, 1, "t2")]).await.unwrap();

    let notifications = recorder
        .select_notifications(1, 10, None, &[], true)
        .await
        .unwrap();
    assert_eq!(ids(&notifications), vec![1, 2, 3]);
    assert_eq!(notifications[0].originator_id, agg_a);
    assert_eq!(notifications[2].originator_id, agg_b);
    assert_eq!(recorder.max_notification_id().await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_max_notification_id_is_non_decreasing() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    let aggregate = Uuid::new_v4();

    recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await.unwrap();
    let first = recorder.max_notification_id().await.unwrap();
    let again = recorder.max_notification_id().await.unwrap();
    assert_eq!(first, again);

    recorder.insert_events(&[make_event(aggregate, 2, "t1")]).await.unwrap();
    let after_insert = recorder.max_notification_id().await.unwrap();
    assert!(after_insert >= first);
    assert_eq!(after_insert, Some(2));
}

#[tokio::test]
async fn test_failed_version_conflict_assigns_no_notification() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    let aggregate = Uuid::new_v4();

    recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await.unwrap();
    let result = recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await;
    assert!(matches!(result, Err(RecorderError::VersionConflict { .. })));

    assert_eq!(recorder.max_notification_id().await.unwrap(), Some(1));
}

// --- select_notifications ---

#[tokio::test]
async fn test_start_bound_inclusive_and_exclusive() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    let aggregate = Uuid::new_v4();
    let events: Vec<_> = (1..=4).map(|v| make_event(aggregate, v, "t1")).collect();
    recorder.insert_events(&events).await.unwrap();

    let inclusive = recorder
        .select_notifications(2, 10, None, &[], true)
        .await
        .unwrap();
    assert_eq!(ids(&inclusive), vec![2, 3, 4]);

    let exclusive = recorder
        .select_notifications(2, 10, None, &[], false)
        .await
        .unwrap();
    assert_eq!(ids(&exclusive), vec![3, 4]);
}

#[tokio::test]
async fn test_stop_bound_is_inclusive() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    let aggregate = Uuid::new_v4();
    let events: Vec<_> = (1..=4).map(|v| make_event(aggregate, v, "t1")).collect();
    recorder.insert_events(&events).await.unwrap();

    let notifications = recorder
        .select_notifications(1, 10, Some(3), &[], true)
        .await
        .unwrap();
    assert_eq!(ids(&notifications), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_limit_truncates_and_resume_has_no_gaps() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::with_page_size(
        "events", 1,
    )));
    let aggregate = Uuid::new_v4();
    let events: Vec<_> = (1..=5).map(|v| make_event(aggregate, v, "t1")).collect();
    recorder.insert_events(&events).await.unwrap();

    let first = recorder
        .select_notifications(1, 2, None, &[], true)
        .await
        .unwrap();
    assert_eq!(ids(&first), vec![1, 2]);

    let next = recorder
        .select_notifications(first.last().unwrap().id, 10, None, &[], false)
        .await
        .unwrap();
    assert_eq!(ids(&next), vec![3, 4, 5]);
}

#[tokio::test]
async fn test_topic_filter_selects_only_matching_topics() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::with_page_size(
        "events", 1,
    )));
    let aggregate = Uuid::new_v4();
    recorder
        .insert_events(&[
            make_event(aggregate, 1, "t1"),
            make_event(aggregate, 2, "t2"),
            make_event(aggregate, 3, "t1"),
            make_event(aggregate, 4, "t2"),
        ])
        .await
        .unwrap();

    let filtered = recorder
        .select_notifications(1, 10, None, &["t2".to_string()], true)
        .await
        .unwrap();
    assert_eq!(ids(&filtered), vec![2, 4]);
    assert!(filtered.iter().all(|n| n.topic == "t2"));
}

#[tokio::test]
async fn test_topic_filter_with_limit_does_not_under_return() {
    // With a backend page size of 1, a pushed-down limit would truncate the
    // scan before enough matching topics were seen.
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::with_page_size(
        "events", 1,
    )));
    let aggregate = Uuid::new_v4();
    recorder
        .insert_events(&[
            make_event(aggregate, 1, "t1"),
            make_event(aggregate, 2, "t1"),
            make_event(aggregate, 3, "t1"),
            make_event(aggregate, 4, "t2"),
            make_event(aggregate, 5, "t2"),
        ])
        .await
        .unwrap();

    let filtered = recorder
        .select_notifications(1, 2, None, &["t2".to_string()], true)
        .await
        .unwrap();
    assert_eq!(ids(&filtered), vec![4, 5]);
}

#[tokio::test]
async fn test_empty_topics_means_all_topics() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    let aggregate = Uuid::new_v4();
    recorder
        .insert_events(&[make_event(aggregate, 1, "t1"), make_event(aggregate, 2, "t2")])
        .await
        .unwrap();

    let notifications = recorder
        .select_notifications(1, 10, None, &[], true)
        .await
        .unwrap();
    assert_eq!(notifications.len(), 2);
}

// --- concurrent id allocation ---

#[tokio::test]
async fn test_concurrent_writers_are_assigned_distinct_dense_ids() {
    let store = Arc::new(MemoryPartitionStore::new("events"));
    let left = ApplicationRecorder::new(store.clone());
    let right = ApplicationRecorder::new(store);
    let agg_a = Uuid::new_v4();
    let agg_b = Uuid::new_v4();

    let left_events = [make_event(agg_a, 1, "t1"), make_event(agg_a, 2, "t1")];
    let right_events = [make_event(agg_b, 1, "t2"), make_event(agg_b, 2, "t2")];
    let (a, b) = tokio::join!(
        left.insert_events(&left_events),
        right.insert_events(&right_events),
    );
    a.unwrap();
    b.unwrap();

    // Every event got its own id and the log has no holes.
    let notifications = left.select_notifications(1, 10, None, &[], true).await.unwrap();
    assert_eq!(ids(&notifications), vec![1, 2, 3, 4]);
    let mut pairs: Vec<_> = notifications
        .iter()
        .map(|n| (n.originator_id, n.originator_version))
        .collect();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), 4);
    assert_eq!(left.max_notification_id().await.unwrap(), Some(4));
}

#[tokio::test]
async fn test_id_claim_gives_up_after_bounded_attempts() {
    let store = Arc::new(ContestedLogStore::new());
    let recorder = ApplicationRecorder::new(store.clone());
    let aggregate = Uuid::new_v4();

    let result = recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await;
    match result {
        Err(RecorderError::Access { store: name, message }) => {
            assert_eq!(name, "events");
            assert!(message.contains("notification id"));
        }
        other => panic!("expected Access, got {other:?}"),
    }
    assert_eq!(store.lost_claims(), 10);
}

// --- write-path fault recovery ---

#[tokio::test]
async fn test_log_copy_outage_is_repaired_by_conflict_retry() {
    let store = Arc::new(PartitionOutageStore::new("$notifications"));
    let recorder = ApplicationRecorder::new(store.clone());
    let aggregate = Uuid::new_v4();

    // The stream record commits, the log copy does not.
    let result = recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await;
    assert!(matches!(result, Err(RecorderError::Access { .. })));
    let committed = recorder
        .select_events(aggregate, None, None, false, None)
        .await
        .unwrap();
    assert_eq!(committed.len(), 1);
    assert_eq!(recorder.max_notification_id().await.unwrap(), None);

    // Once the store is reachable again, the caller's ordinary retry reports
    // the conflict and backfills the missing log copy.
    store.restore();
    let retry = recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await;
    assert!(matches!(retry, Err(RecorderError::VersionConflict { .. })));

    let notifications = recorder.select_notifications(1, 10, None, &[], true).await.unwrap();
    assert_eq!(ids(&notifications), vec![1]);
    assert_eq!(notifications[0].originator_id, aggregate);
    assert_eq!(notifications[0].originator_version, 1);
    assert_eq!(notifications[0].state, b"payload-1");
    assert_eq!(recorder.max_notification_id().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_interrupted_marker_write_does_not_duplicate_log_copies() {
    let store = Arc::new(PartitionOutageStore::new("$notified#"));
    let recorder = ApplicationRecorder::new(store.clone());
    let aggregate = Uuid::new_v4();

    // The log copy lands but the writer fails just after it.
    let result = recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await;
    assert!(matches!(result, Err(RecorderError::Access { .. })));
    let notifications = recorder.select_notifications(1, 10, None, &[], true).await.unwrap();
    assert_eq!(ids(&notifications), vec![1]);

    // The retry adopts the existing copy instead of appending a second one.
    store.restore();
    let retry = recorder.insert_events(&[make_event(aggregate, 1, "t1")]).await;
    assert!(matches!(retry, Err(RecorderError::VersionConflict { .. })));
    let notifications = recorder.select_notifications(1, 10, None, &[], true).await.unwrap();
    assert_eq!(ids(&notifications), vec![1]);
    assert_eq!(recorder.max_notification_id().await.unwrap(), Some(1));
}

// --- end-to-end scenario ---

#[tokio::test]
async fn test_events_and_notifications_end_to_end() {
    let recorder = ApplicationRecorder::new(Arc::new(MemoryPartitionStore::new("events")));
    let agg_1 = Uuid::new_v4();
    recorder
        .insert_events(&[
            make_event(agg_1, 1, "t1"),
            make_event(agg_1, 2, "t1"),
            make_event(agg_1, 3, "t2"),
        ])
        .await
        .unwrap();

    let after_first = recorder
        .select_events(agg_1, Some(1), None, false, None)
        .await
        .unwrap();
    assert_eq!(
        after_first.iter().map(|e| e.originator_version).collect::<Vec<_>>(),
        vec![2, 3]
    );

    let up_to_two_desc = recorder
        .select_events(agg_1, None, Some(2), true, None)
        .await
        .unwrap();
    assert_eq!(
        up_to_two_desc
            .iter()
            .map(|e| e.originator_version)
            .collect::<Vec<_>>(),
        vec![2, 1]
    );

    let t2_only = recorder
        .select_notifications(1, 10, None, &["t2".to_string()], true)
        .await
        .unwrap();
    assert_eq!(t2_only.len(), 1);
    assert_eq!(t2_only[0].originator_version, 3);
    assert_eq!(t2_only[0].originator_id, agg_1);
}
