//! Mapping between domain records and store records.
//!
//! Event records live in a partition named by the hyphenated originator UUID,
//! sort-keyed by version. Notification and tracking records live in reserved
//! partitions prefixed with `$`, which cannot collide with UUID partitions.

use chrono::{DateTime, Utc};
use chronicle_core::error::RecorderError;
use chronicle_core::event::{Notification, StoredEvent};
use chronicle_core::store::{AttributeValue, Attributes, StoreRecord};
use uuid::Uuid;

pub(crate) const ATTR_ORIGINATOR_ID: &str = "originator_id";
pub(crate) const ATTR_ORIGINATOR_VERSION: &str = "originator_version";
pub(crate) const ATTR_TOPIC: &str = "topic";
pub(crate) const ATTR_STATE: &str = "state";
pub(crate) const ATTR_CREATED_AT: &str = "created_at";
pub(crate) const ATTR_APPLICATION_NAME: &str = "application_name";
pub(crate) const ATTR_NOTIFICATION_ID: &str = "notification_id";

/// The single total-ordered notification log of the owning application.
pub(crate) const NOTIFICATION_PARTITION: &str = "$notifications";

pub(crate) fn event_partition_key(originator_id: Uuid) -> String {
    originator_id.to_string()
}

pub(crate) fn tracking_partition_key(application_name: &str) -> String {
    format!("$tracking#{application_name}")
}

/// Marker partition recording which of an aggregate's versions have their
/// notification-log copy in place.
pub(crate) fn notified_partition_key(originator_id: Uuid) -> String {
    format!("$notified#{originator_id}")
}

fn event_attributes(event: &StoredEvent, created_at: DateTime<Utc>) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        ATTR_ORIGINATOR_ID.to_string(),
        AttributeValue::Text(event.originator_id.to_string()),
    );
    attributes.insert(
        ATTR_ORIGINATOR_VERSION.to_string(),
        AttributeValue::Integer(event.originator_version),
    );
    attributes.insert(
        ATTR_TOPIC.to_string(),
        AttributeValue::Text(event.topic.clone()),
    );
    attributes.insert(
        ATTR_STATE.to_string(),
        AttributeValue::Bytes(event.state.clone()),
    );
    attributes.insert(
        ATTR_CREATED_AT.to_string(),
        AttributeValue::Timestamp(created_at),
    );
    attributes
}

/// Builds the event-stream record for one stored event.
pub(crate) fn event_record(event: &StoredEvent, created_at: DateTime<Utc>) -> StoreRecord {
    StoreRecord {
        partition_key: event_partition_key(event.originator_id),
        sort_key: event.originator_version,
        attributes: event_attributes(event, created_at),
    }
}

/// Builds the notification-log record for one stored event, keyed by the
/// claimed notification id.
pub(crate) fn notification_record(
    event: &StoredEvent,
    notification_id: i64,
    created_at: DateTime<Utc>,
) -> StoreRecord {
    StoreRecord {
        partition_key: NOTIFICATION_PARTITION.to_string(),
        sort_key: notification_id,
        attributes: event_attributes(event, created_at),
    }
}

/// Builds the marker record declaring that the version's notification-log
/// copy has been written under `notification_id`.
pub(crate) fn notified_record(
    originator_id: Uuid,
    originator_version: i64,
    notification_id: i64,
) -> StoreRecord {
    let mut attributes = Attributes::new();
    attributes.insert(
        ATTR_NOTIFICATION_ID.to_string(),
        AttributeValue::Integer(notification_id),
    );
    StoreRecord {
        partition_key: notified_partition_key(originator_id),
        sort_key: originator_version,
        attributes,
    }
}

/// Builds the tracking-ledger record for one processed notification.
pub(crate) fn tracking_record(application_name: &str, notification_id: i64) -> StoreRecord {
    let mut attributes = Attributes::new();
    attributes.insert(
        ATTR_APPLICATION_NAME.to_string(),
        AttributeValue::Text(application_name.to_string()),
    );
    StoreRecord {
        partition_key: tracking_partition_key(application_name),
        sort_key: notification_id,
        attributes,
    }
}

fn malformed(store: &str, record: &StoreRecord, detail: &str) -> RecorderError {
    RecorderError::Access {
        store: store.to_string(),
        message: format!(
            "malformed record at ({}, {}): {detail}",
            record.partition_key, record.sort_key
        ),
    }
}

fn attribute<'a>(
    store: &str,
    record: &'a StoreRecord,
    name: &str,
) -> Result<&'a AttributeValue, RecorderError> {
    record
        .attributes
        .get(name)
        .ok_or_else(|| malformed(store, record, &format!("missing attribute `{name}`")))
}

/// Decodes an event-stream or notification-log record back into a
/// [`StoredEvent`].
pub(crate) fn decode_event(store: &str, record: &StoreRecord) -> Result<StoredEvent, RecorderError> {
    let originator_id = attribute(store, record, ATTR_ORIGINATOR_ID)?
        .as_text()
        .and_then(|text| Uuid::parse_str(text).ok())
        .ok_or_else(|| malformed(store, record, "`originator_id` is not a UUID"))?;
    let originator_version = attribute(store, record, ATTR_ORIGINATOR_VERSION)?
        .as_integer()
        .ok_or_else(|| malformed(store, record, "`originator_version` is not an integer"))?;
    let topic = attribute(store, record, ATTR_TOPIC)?
        .as_text()
        .ok_or_else(|| malformed(store, record, "`topic` is not text"))?
        .to_string();
    let state = attribute(store, record, ATTR_STATE)?
        .as_bytes()
        .ok_or_else(|| malformed(store, record, "`state` is not bytes"))?
        .to_vec();
    let created_at = attribute(store, record, ATTR_CREATED_AT)?
        .as_timestamp()
        .ok_or_else(|| malformed(store, record, "`created_at` is not a timestamp"))?;

    Ok(StoredEvent {
        originator_id,
        originator_version,
        topic,
        state,
        created_at: Some(created_at),
    })
}

/// Decodes a notification-log record; the sort key is the notification id.
pub(crate) fn decode_notification(
    store: &str,
    record: &StoreRecord,
) -> Result<Notification, RecorderError> {
    let event = decode_event(store, record)?;
    Ok(Notification {
        id: record.sort_key,
        originator_id: event.originator_id,
        originator_version: event.originator_version,
        topic: event.topic,
        state: event.state,
        created_at: event.created_at,
    })
}
