//! Storage-backed notification log recorder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_core::clock::Clock;
use chronicle_core::error::RecorderError;
use chronicle_core::event::{Notification, StoredEvent};
use chronicle_core::recorder::{EventRecorder, NotificationRecorder};
use chronicle_core::store::{
    AttributeValue, Direction, PartitionStore, SortRange, StoreError, StoreQuery,
};
use uuid::Uuid;

use crate::aggregate_recorder::AggregateRecorder;
use crate::mapping::{
    ATTR_ORIGINATOR_ID, ATTR_ORIGINATOR_VERSION, ATTR_TOPIC, NOTIFICATION_PARTITION,
    decode_notification, notification_record, notified_partition_key, notified_record,
};
use crate::paging::{access_error, collect_pages};

/// Bound on optimistic retries when claiming a notification id under
/// contention. Exceeding it surfaces as an access error rather than an
/// unbounded retry storm.
const MAX_ID_CLAIM_ATTEMPTS: u32 = 10;

/// An [`AggregateRecorder`] whose events also land in the application's
/// total-ordered notification log.
///
/// Notification ids are allocated by claiming the slot at `current_max + 1`
/// with a conditional put; the claim itself is the linearization point, so
/// ids are strictly increasing and never reused even under concurrent
/// writers. A lost claim (another writer took the slot) is retried up to
/// [`MAX_ID_CLAIM_ATTEMPTS`] times.
///
/// A stream record, its log copy, and its `$notified` marker are three
/// separate puts, so a writer can fail between them. The marker is written
/// last and classifies a version as fully logged; `insert_events` repairs an
/// unmarked version (scan the log for a stray copy, otherwise claim and
/// append one from the committed stream record) before it reports a version
/// conflict. An event that durably committed but lost its log copy is
/// therefore healed by the caller's ordinary conflict retry rather than
/// silently vanishing from the notification log.
#[derive(Clone)]
pub struct ApplicationRecorder {
    events: AggregateRecorder,
}

impl ApplicationRecorder {
    /// Creates a recorder over `store`, stamping `created_at` from the
    /// system clock.
    #[must_use]
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self {
            events: AggregateRecorder::new(store),
        }
    }

    /// Creates a recorder that stamps `created_at` from `clock`.
    #[must_use]
    pub fn with_clock(store: Arc<dyn PartitionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: AggregateRecorder::with_clock(store, clock),
        }
    }

    pub(crate) fn store(&self) -> &dyn PartitionStore {
        self.events.store()
    }

    /// Reads the highest sort key in `partition_key`, or `None` if the
    /// partition is empty. Descending query, page size 1.
    pub(crate) async fn max_sort_key(
        &self,
        partition_key: &str,
    ) -> Result<Option<i64>, RecorderError> {
        let page = self
            .store()
            .query(StoreQuery {
                partition_key: partition_key.to_string(),
                range: SortRange::default(),
                direction: Direction::Descending,
                limit: Some(1),
                start: None,
            })
            .await
            .map_err(|err| access_error(self.store(), &err))?;
        Ok(page.records.first().map(|record| record.sort_key))
    }

    /// Claims the next notification id for `event` and writes the log copy
    /// under it.
    async fn claim_notification_id(
        &self,
        event: &StoredEvent,
        created_at: DateTime<Utc>,
    ) -> Result<i64, RecorderError> {
        for _ in 0..MAX_ID_CLAIM_ATTEMPTS {
            let id = self.max_sort_key(NOTIFICATION_PARTITION).await?.unwrap_or(0) + 1;
            match self
                .store()
                .conditional_put(notification_record(event, id, created_at))
                .await
            {
                Ok(()) => return Ok(id),
                // Lost the claim to a concurrent writer; re-read the max.
                Err(StoreError::AlreadyExists { .. }) => {}
                Err(err) => return Err(access_error(self.store(), &err)),
            }
        }
        Err(RecorderError::Access {
            store: self.store().store_id().to_string(),
            message: format!(
                "gave up claiming a notification id after {MAX_ID_CLAIM_ATTEMPTS} attempts"
            ),
        })
    }

    /// Records that the version's log copy is in place. Idempotent.
    async fn mark_notified(
        &self,
        originator_id: Uuid,
        originator_version: i64,
        notification_id: i64,
    ) -> Result<(), RecorderError> {
        let record = notified_record(originator_id, originator_version, notification_id);
        match self.store().conditional_put(record).await {
            Ok(()) | Err(StoreError::AlreadyExists { .. }) => Ok(()),
            Err(err) => Err(access_error(self.store(), &err)),
        }
    }

    /// Returns whether the version has its `$notified` marker.
    async fn is_notified(
        &self,
        originator_id: Uuid,
        originator_version: i64,
    ) -> Result<bool, RecorderError> {
        let records = collect_pages(
            self.store(),
            &notified_partition_key(originator_id),
            SortRange {
                gt: Some(originator_version.saturating_sub(1)),
                lte: Some(originator_version),
            },
            Direction::Ascending,
            Some(1),
            true,
            |_| true,
        )
        .await?;
        Ok(!records.is_empty())
    }

    /// Scans the log for an existing copy of the version. Only reached on
    /// the repair path, after a writer failed mid-insert.
    async fn find_log_copy(
        &self,
        originator_id: Uuid,
        originator_version: i64,
    ) -> Result<Option<Notification>, RecorderError> {
        let originator = originator_id.to_string();
        let records = collect_pages(
            self.store(),
            NOTIFICATION_PARTITION,
            SortRange::default(),
            Direction::Ascending,
            Some(1),
            false,
            |record| {
                record
                    .attributes
                    .get(ATTR_ORIGINATOR_ID)
                    .and_then(AttributeValue::as_text)
                    .is_some_and(|id| id == originator)
                    && record
                        .attributes
                        .get(ATTR_ORIGINATOR_VERSION)
                        .and_then(AttributeValue::as_integer)
                        == Some(originator_version)
            },
        )
        .await?;
        records
            .first()
            .map(|record| decode_notification(self.store().store_id(), record))
            .transpose()
    }

    /// Writes the log copy and the marker for one freshly committed event.
    async fn append_notification(
        &self,
        event: &StoredEvent,
        created_at: DateTime<Utc>,
    ) -> Result<i64, RecorderError> {
        let id = self.claim_notification_id(event, created_at).await?;
        self.mark_notified(event.originator_id, event.originator_version, id)
            .await?;
        Ok(id)
    }

    /// Completes the notification-log half of a committed version whose
    /// writer failed before the log copy or the marker landed. A version
    /// with its marker in place short-circuits, keeping ordinary conflicts
    /// cheap.
    async fn repair_missing_notification(
        &self,
        originator_id: Uuid,
        originator_version: i64,
    ) -> Result<(), RecorderError> {
        if self.is_notified(originator_id, originator_version).await? {
            return Ok(());
        }
        let committed = self
            .events
            .select_events(
                originator_id,
                Some(originator_version.saturating_sub(1)),
                Some(originator_version),
                false,
                Some(1),
            )
            .await?;
        let Some(event) = committed.first() else {
            return Ok(());
        };
        // A stray copy without its marker means the writer failed between
        // the two puts; adopt the copy instead of appending a duplicate.
        if let Some(copy) = self.find_log_copy(originator_id, originator_version).await? {
            return self.mark_notified(originator_id, originator_version, copy.id).await;
        }
        let created_at = event.created_at.unwrap_or_else(|| self.events.now());
        self.append_notification(event, created_at).await.map(|_| ())
    }
}

#[async_trait]
impl EventRecorder for ApplicationRecorder {
    async fn insert_events(&self, events: &[StoredEvent]) -> Result<(), RecorderError> {
        let created_at = self.events.now();
        for event in events {
            match self.events.put_event(event, created_at).await {
                Ok(()) => {
                    self.append_notification(event, created_at).await?;
                }
                Err(conflict @ RecorderError::VersionConflict { .. }) => {
                    // The version is taken; if its writer never finished the
                    // log copy, finish it before reporting the conflict.
                    self.repair_missing_notification(event.originator_id, event.originator_version)
                        .await?;
                    return Err(conflict);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn select_events(
        &self,
        originator_id: Uuid,
        gt: Option<i64>,
        lte: Option<i64>,
        desc: bool,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, RecorderError> {
        self.events
            .select_events(originator_id, gt, lte, desc, limit)
            .await
    }
}

#[async_trait]
impl NotificationRecorder for ApplicationRecorder {
    async fn select_notifications(
        &self,
        start: i64,
        limit: usize,
        stop: Option<i64>,
        topics: &[String],
        inclusive_of_start: bool,
    ) -> Result<Vec<Notification>, RecorderError> {
        let gt = if inclusive_of_start {
            start.saturating_sub(1)
        } else {
            start
        };
        let range = SortRange {
            gt: Some(gt),
            lte: stop,
        };

        // Topic filtering happens client-side, so the backend page limit must
        // not truncate when a filter is active.
        let records = collect_pages(
            self.store(),
            NOTIFICATION_PARTITION,
            range,
            Direction::Ascending,
            Some(limit),
            topics.is_empty(),
            |record| {
                topics.is_empty()
                    || record
                        .attributes
                        .get(ATTR_TOPIC)
                        .and_then(|value| value.as_text())
                        .is_some_and(|topic| topics.iter().any(|wanted| wanted == topic))
            },
        )
        .await?;

        records
            .iter()
            .map(|record| decode_notification(self.store().store_id(), record))
            .collect()
    }

    async fn max_notification_id(&self) -> Result<Option<i64>, RecorderError> {
        self.max_sort_key(NOTIFICATION_PARTITION).await
    }
}
