//! Recorder capability traits.
//!
//! Three embedded capability levels: [`EventRecorder`] for per-aggregate
//! event sequences, [`NotificationRecorder`] adding the total-ordered
//! notification log, and [`TrackingRecorder`] adding the cross-application
//! tracking ledger. A concrete recorder implements the narrowest interface it
//! supports; callers depend only on the interface they need.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RecorderError;
use crate::event::{Notification, StoredEvent, Tracking};

/// Appends and retrieves one aggregate's event sequence.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Appends `events` to their aggregate streams.
    ///
    /// Each event is written with a conditional put keyed by
    /// `(originator_id, originator_version)`. The call is all-or-nothing from
    /// the caller's perspective: if any event's version is already taken the
    /// whole call fails and no subset is reported as committed. An empty
    /// slice is a no-op. `created_at` is stamped at write time.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::VersionConflict`] when a version is already
    /// committed, or [`RecorderError::Access`] on backend failure.
    async fn insert_events(&self, events: &[StoredEvent]) -> Result<(), RecorderError>;

    /// Returns the aggregate's events with version strictly greater than
    /// `gt` and less than or equal to `lte` (either bound optional), ordered
    /// by version (descending when `desc`), truncated to `limit`.
    ///
    /// Pagination against the backend is exhaustive: every page is followed
    /// until the backend reports no continuation token or `limit` is
    /// satisfied. Callers should expect multi-round-trip latency for long
    /// streams.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Access`] on backend failure; partial results
    /// from pages fetched before the failure are discarded.
    async fn select_events(
        &self,
        originator_id: Uuid,
        gt: Option<i64>,
        lte: Option<i64>,
        desc: bool,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, RecorderError>;
}

/// An [`EventRecorder`] whose events also appear in a total-ordered
/// notification log.
#[async_trait]
pub trait NotificationRecorder: EventRecorder {
    /// Returns notifications with id ≥ `start` (or > `start` when
    /// `inclusive_of_start` is false), optionally ≤ `stop`, filtered to
    /// `topics` (empty means all), ascending by id, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Access`] on backend failure.
    async fn select_notifications(
        &self,
        start: i64,
        limit: usize,
        stop: Option<i64>,
        topics: &[String],
        inclusive_of_start: bool,
    ) -> Result<Vec<Notification>, RecorderError>;

    /// Returns the highest committed notification id, or `None` if no
    /// notification has been committed yet.
    ///
    /// Within one recorder instance this reflects every `insert_events` call
    /// that has returned.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Access`] on backend failure.
    async fn max_notification_id(&self) -> Result<Option<i64>, RecorderError>;
}

/// A [`NotificationRecorder`] that also keeps the owning application's
/// tracking ledger over upstream notification logs.
#[async_trait]
pub trait TrackingRecorder: NotificationRecorder {
    /// Records that the notification named by `tracking` has been durably
    /// processed. Idempotent: recording an already-present pair succeeds
    /// without changing the observable state.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Access`] on backend failure.
    async fn insert_tracking(&self, tracking: &Tracking) -> Result<(), RecorderError>;

    /// Returns the highest notification id recorded as processed from
    /// `application_name`'s log, or `None` if none has been.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Access`] on backend failure.
    async fn max_tracking_id(
        &self,
        application_name: &str,
    ) -> Result<Option<i64>, RecorderError>;

    /// Returns whether `notification_id` from `application_name`'s log has
    /// already been recorded as processed.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Access`] on backend failure.
    async fn has_tracking_id(
        &self,
        application_name: &str,
        notification_id: i64,
    ) -> Result<bool, RecorderError>;
}
