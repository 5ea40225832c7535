//! Storage-backed aggregate event recorder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::error::RecorderError;
use chronicle_core::event::StoredEvent;
use chronicle_core::recorder::EventRecorder;
use chronicle_core::store::{Direction, PartitionStore, SortRange, StoreError};
use uuid::Uuid;

use crate::mapping::{decode_event, event_partition_key, event_record};
use crate::paging::{access_error, collect_pages};

/// Appends and retrieves one aggregate's event sequence over a
/// [`PartitionStore`].
///
/// Version uniqueness is enforced by the backend: each event is written with
/// a conditional put keyed by `(originator_id, originator_version)`, so two
/// concurrent writers racing on the same version resolve to exactly one
/// success and one [`RecorderError::VersionConflict`], without any in-process
/// lock.
#[derive(Clone)]
pub struct AggregateRecorder {
    store: Arc<dyn PartitionStore>,
    clock: Arc<dyn Clock>,
}

impl AggregateRecorder {
    /// Creates a recorder over `store`, stamping `created_at` from the
    /// system clock.
    #[must_use]
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a recorder that stamps `created_at` from `clock`.
    #[must_use]
    pub fn with_clock(store: Arc<dyn PartitionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub(crate) fn store(&self) -> &dyn PartitionStore {
        self.store.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Writes one event with a conditional put on its version slot.
    pub(crate) async fn put_event(
        &self,
        event: &StoredEvent,
        created_at: DateTime<Utc>,
    ) -> Result<(), RecorderError> {
        match self.store.conditional_put(event_record(event, created_at)).await {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists { .. }) => Err(RecorderError::VersionConflict {
                originator_id: event.originator_id,
                version: event.originator_version,
            }),
            Err(err) => Err(access_error(self.store.as_ref(), &err)),
        }
    }
}

#[async_trait]
impl EventRecorder for AggregateRecorder {
    async fn insert_events(&self, events: &[StoredEvent]) -> Result<(), RecorderError> {
        let created_at = self.clock.now();
        for event in events {
            self.put_event(event, created_at).await?;
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
        let direction = if desc {
            Direction::Descending
        } else {
            Direction::Ascending
        };
        let records = collect_pages(
            self.store.as_ref(),
            &event_partition_key(originator_id),
            SortRange { gt, lte },
            direction,
            limit,
            true,
            |_| true,
        )
        .await?;

        records
            .iter()
            .map(|record| decode_event(self.store.store_id(), record))
            .collect()
    }
}
