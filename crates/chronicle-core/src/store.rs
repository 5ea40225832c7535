//! Partitioned ordered store contract.
//!
//! Backend adapters implement [`PartitionStore`] over whatever storage engine
//! they wrap. The recorder core depends only on this trait: conditional put
//! (reject on existing key), paginated range query with forward-resume
//! tokens, and best-effort batch put.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single typed attribute value.
///
/// Adapters normalize backend-specific wrapper types (binary views, numeric
/// strings, driver-level timestamp types) into these canonical forms at the
/// boundary, so the recorder core never branches on representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// UTF-8 text.
    Text(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl AttributeValue {
    /// Returns the text value, if this is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Integer`.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the byte value, if this is a `Bytes`.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the timestamp value, if this is a `Timestamp`.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// Named attributes of one store record. `BTreeMap` keeps serialization
/// deterministic.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// One record in the partitioned store, addressed by
/// `(partition_key, sort_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Partition the record belongs to.
    pub partition_key: String,
    /// Position within the partition's sort order.
    pub sort_key: i64,
    /// Record payload.
    pub attributes: Attributes,
}

/// Half-open range condition on the sort key: strictly greater than `gt`,
/// less than or equal to `lte`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortRange {
    /// Lower bound, exclusive.
    pub gt: Option<i64>,
    /// Upper bound, inclusive.
    pub lte: Option<i64>,
}

impl SortRange {
    /// Returns whether `sort_key` satisfies both bounds.
    #[must_use]
    pub fn contains(&self, sort_key: i64) -> bool {
        self.gt.is_none_or(|gt| sort_key > gt) && self.lte.is_none_or(|lte| sort_key <= lte)
    }
}

/// Sort-key ordering of query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Lowest sort key first.
    #[default]
    Ascending,
    /// Highest sort key first.
    Descending,
}

/// Opaque keyset-resume token: the sort key of the last record in the
/// previous page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken {
    /// Sort key the next page resumes after (in the query's direction).
    pub last_sort_key: i64,
}

/// A range query against one partition.
#[derive(Debug, Clone)]
pub struct StoreQuery {
    /// Partition to query (equality condition).
    pub partition_key: String,
    /// Optional sort-key bounds.
    pub range: SortRange,
    /// Result ordering.
    pub direction: Direction,
    /// Maximum number of records in the returned page. The backend may
    /// return fewer; `None` leaves page sizing to the backend.
    pub limit: Option<usize>,
    /// Resume token from the previous page, if any.
    pub start: Option<PageToken>,
}

impl StoreQuery {
    /// Creates an unbounded ascending query over one partition.
    #[must_use]
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            range: SortRange::default(),
            direction: Direction::default(),
            limit: None,
            start: None,
        }
    }
}

/// One bounded page of query results. `next` is present iff more matching
/// records exist beyond this page.
#[derive(Debug, Clone)]
pub struct StorePage {
    /// Records in this page, in the requested order.
    pub records: Vec<StoreRecord>,
    /// Resume token for the next page, if more records match.
    pub next: Option<PageToken>,
}

/// Errors surfaced by a [`PartitionStore`].
///
/// Every backend-level failure — connectivity, throttling, permission,
/// serialization — is wrapped into `Unavailable` at the adapter boundary and
/// logged there with the store identifier; raw backend error types never
/// reach recorder callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same `(partition_key, sort_key)` already exists.
    #[error("record already exists at ({partition_key}, {sort_key})")]
    AlreadyExists {
        /// Partition of the colliding record.
        partition_key: String,
        /// Sort key of the colliding record.
        sort_key: i64,
    },

    /// The backend could not serve the request.
    #[error("store {store} unavailable: {message}")]
    Unavailable {
        /// Identifier of the affected store.
        store: String,
        /// Backend-reported failure detail.
        message: String,
    },
}

/// A partitioned ordered store: the only primitives the recorder core
/// requires of a backend.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Identifier of the underlying store (table name or equivalent), used
    /// in diagnostics.
    fn store_id(&self) -> &str;

    /// Inserts `record` only if no record with the same
    /// `(partition_key, sort_key)` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the key is taken, or
    /// [`StoreError::Unavailable`] on backend failure.
    async fn conditional_put(&self, record: StoreRecord) -> Result<(), StoreError>;

    /// Best-effort bulk insert. Any individual item failure surfaces as an
    /// error; items are never silently dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if any item could not be written.
    async fn batch_put(&self, records: Vec<StoreRecord>) -> Result<(), StoreError>;

    /// Returns one bounded page of records matching the query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn query(&self, query: StoreQuery) -> Result<StorePage, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_range_unbounded_contains_everything() {
        let range = SortRange::default();
        assert!(range.contains(i64::MIN));
        assert!(range.contains(0));
        assert!(range.contains(i64::MAX));
    }

    #[test]
    fn test_sort_range_gt_is_exclusive() {
        let range = SortRange {
            gt: Some(3),
            lte: None,
        };
        assert!(!range.contains(3));
        assert!(range.contains(4));
    }

    #[test]
    fn test_sort_range_lte_is_inclusive() {
        let range = SortRange {
            gt: None,
            lte: Some(3),
        };
        assert!(range.contains(3));
        assert!(!range.contains(4));
    }

    #[test]
    fn test_sort_range_both_bounds_intersect() {
        let range = SortRange {
            gt: Some(1),
            lte: Some(3),
        };
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(3));
        assert!(!range.contains(4));
    }

    #[test]
    fn test_attribute_accessors_return_none_on_mismatch() {
        let text = AttributeValue::Text("t1".into());
        assert_eq!(text.as_text(), Some("t1"));
        assert_eq!(text.as_integer(), None);
        assert_eq!(text.as_bytes(), None);
        assert_eq!(text.as_timestamp(), None);

        let n = AttributeValue::Integer(42);
        assert_eq!(n.as_integer(), Some(42));
        assert_eq!(n.as_text(), None);
    }
}
