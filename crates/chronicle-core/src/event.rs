//! Stored event, notification, and tracking records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One immutable domain event record.
///
/// The payload in `state` is opaque to the recorder: it is carried as raw
/// bytes and never inspected. Backend adapters normalize whatever wrapper
/// representation their client library uses into this form at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Aggregate/stream this event belongs to. Partition key.
    pub originator_id: Uuid,
    /// Monotonically increasing, gap-free version within the aggregate
    /// stream. Sort key together with `originator_id`.
    pub originator_version: i64,
    /// Type name for deserialization routing and notification filtering.
    pub topic: String,
    /// Opaque serialized payload.
    pub state: Vec<u8>,
    /// Server-assigned insertion timestamp. `None` until the event has been
    /// persisted; recorders stamp it at write time. Informational only, never
    /// used for ordering.
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredEvent {
    /// Creates an unpersisted event with no `created_at` stamp.
    #[must_use]
    pub fn new(
        originator_id: Uuid,
        originator_version: i64,
        topic: impl Into<String>,
        state: Vec<u8>,
    ) -> Self {
        Self {
            originator_id,
            originator_version,
            topic: topic.into(),
            state,
            created_at: None,
        }
    }
}

/// A stored event annotated with its position in the application's
/// total-ordered notification log.
///
/// Notification ids start at 1 and are strictly increasing; they are assigned
/// at commit time and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Globally unique, strictly increasing notification id.
    pub id: i64,
    /// Aggregate the underlying event belongs to.
    pub originator_id: Uuid,
    /// Version of the underlying event within its aggregate stream.
    pub originator_version: i64,
    /// Type name of the underlying event.
    pub topic: String,
    /// Opaque serialized payload of the underlying event.
    pub state: Vec<u8>,
    /// Insertion timestamp of the underlying event.
    pub created_at: Option<DateTime<Utc>>,
}

/// A consumer's durable checkpoint: the notification id it has processed
/// from an upstream application's log.
///
/// Written at most once per `(application_name, notification_id)` pair;
/// recording an existing pair is an idempotent no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    /// Name of the upstream application whose log is being consumed.
    pub application_name: String,
    /// Notification id that has been durably processed.
    pub notification_id: i64,
}

impl Tracking {
    /// Creates a tracking record.
    #[must_use]
    pub fn new(application_name: impl Into<String>, notification_id: i64) -> Self {
        Self {
            application_name: application_name.into(),
            notification_id,
        }
    }
}
