//! Storage-backed tracking ledger recorder.

use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::clock::Clock;
use chronicle_core::error::RecorderError;
use chronicle_core::event::{Notification, StoredEvent, Tracking};
use chronicle_core::recorder::{EventRecorder, NotificationRecorder, TrackingRecorder};
use chronicle_core::store::{Direction, PartitionStore, SortRange, StoreError};
use uuid::Uuid;

use crate::application_recorder::ApplicationRecorder;
use crate::mapping::{tracking_partition_key, tracking_record};
use crate::paging::{access_error, collect_pages};

/// An [`ApplicationRecorder`] that also keeps the owning application's
/// tracking ledger: per upstream application, which notification ids have
/// been durably processed.
///
/// Tracking writes are idempotent — a pair that is already recorded is left
/// untouched — so at-least-once redelivery never raises and never changes
/// the observable ledger.
#[derive(Clone)]
pub struct ProcessRecorder {
    inner: ApplicationRecorder,
}

impl ProcessRecorder {
    /// Creates a recorder over `store`, stamping `created_at` from the
    /// system clock.
    #[must_use]
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self {
            inner: ApplicationRecorder::new(store),
        }
    }

    /// Creates a recorder that stamps `created_at` from `clock`.
    #[must_use]
    pub fn with_clock(store: Arc<dyn PartitionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: ApplicationRecorder::with_clock(store, clock),
        }
    }
}

#[async_trait]
impl EventRecorder for ProcessRecorder {
    async fn insert_events(&self, events: &[StoredEvent]) -> Result<(), RecorderError> {
        self.inner.insert_events(events).await
    }

    async fn select_events(
        &self,
        originator_id: Uuid,
        gt: Option<i64>,
        lte: Option<i64>,
        desc: bool,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, RecorderError> {
        self.inner
            .select_events(originator_id, gt, lte, desc, limit)
            .await
    }
}

#[async_trait]
impl NotificationRecorder for ProcessRecorder {
    async fn select_notifications(
        &self,
        start: i64,
        limit: usize,
        stop: Option<i64>,
        topics: &[String],
        inclusive_of_start: bool,
    ) -> Result<Vec<Notification>, RecorderError> {
        self.inner
            .select_notifications(start, limit, stop, topics, inclusive_of_start)
            .await
    }

    async fn max_notification_id(&self) -> Result<Option<i64>, RecorderError> {
        self.inner.max_notification_id().await
    }
}

#[async_trait]
impl TrackingRecorder for ProcessRecorder {
    async fn insert_tracking(&self, tracking: &Tracking) -> Result<(), RecorderError> {
        let record = tracking_record(&tracking.application_name, tracking.notification_id);
        match self.inner.store().conditional_put(record).await {
            // Already recorded: idempotent no-op.
            Ok(()) | Err(StoreError::AlreadyExists { .. }) => Ok(()),
            Err(err) => Err(access_error(self.inner.store(), &err)),
        }
    }

    async fn max_tracking_id(
        &self,
        application_name: &str,
    ) -> Result<Option<i64>, RecorderError> {
        self.inner
            .max_sort_key(&tracking_partition_key(application_name))
            .await
    }

    async fn has_tracking_id(
        &self,
        application_name: &str,
        notification_id: i64,
    ) -> Result<bool, RecorderError> {
        let records = collect_pages(
            self.inner.store(),
            &tracking_partition_key(application_name),
            SortRange {
                gt: Some(notification_id.saturating_sub(1)),
                lte: Some(notification_id),
            },
            Direction::Ascending,
            Some(1),
            true,
            |_| true,
        )
        .await?;
        Ok(!records.is_empty())
    }
}
