//! Test stores — in-memory `PartitionStore` implementations for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::store::{
    Attributes, Direction, PageToken, PartitionStore, StoreError, StorePage, StoreQuery,
    StoreRecord,
};

const DEFAULT_PAGE_SIZE: usize = 100;

/// An in-memory partitioned ordered store.
///
/// Implements the full `PartitionStore` contract: conditional put, batch put,
/// and range queries with keyset pagination. The page size is configurable so
/// tests can force multi-page reads, and queries can be made to fail after a
/// set number of calls to exercise mid-pagination error paths.
#[derive(Debug)]
pub struct MemoryPartitionStore {
    store_id: String,
    page_size: usize,
    partitions: Mutex<BTreeMap<String, BTreeMap<i64, Attributes>>>,
    queries_until_failure: Mutex<Option<u32>>,
}

impl MemoryPartitionStore {
    /// Creates an empty store with the default page size.
    #[must_use]
    pub fn new(store_id: impl Into<String>) -> Self {
        Self::with_page_size(store_id, DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store that returns at most `page_size` records per
    /// query page.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    #[must_use]
    pub fn with_page_size(store_id: impl Into<String>, page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be at least 1");
        Self {
            store_id: store_id.into(),
            page_size,
            partitions: Mutex::new(BTreeMap::new()),
            queries_until_failure: Mutex::new(None),
        }
    }

    /// Makes the next `n` queries succeed and every query after that fail
    /// with `StoreError::Unavailable`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_queries_after(&self, n: u32) {
        *self.queries_until_failure.lock().unwrap() = Some(n);
    }

    /// Returns the number of records currently stored in `partition_key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn partition_len(&self, partition_key: &str) -> usize {
        self.partitions
            .lock()
            .unwrap()
            .get(partition_key)
            .map_or(0, BTreeMap::len)
    }

    fn unavailable(&self, message: &str) -> StoreError {
        StoreError::Unavailable {
            store: self.store_id.clone(),
            message: message.to_string(),
        }
    }

    fn check_query_budget(&self) -> Result<(), StoreError> {
        let mut budget = self.queries_until_failure.lock().unwrap();
        match budget.as_mut() {
            None => Ok(()),
            Some(0) => Err(self.unavailable("injected query failure")),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PartitionStore for MemoryPartitionStore {
    fn store_id(&self) -> &str {
        &self.store_id
    }

    async fn conditional_put(&self, record: StoreRecord) -> Result<(), StoreError> {
        let mut partitions = self.partitions.lock().unwrap();
        let partition = partitions.entry(record.partition_key.clone()).or_default();
        if partition.contains_key(&record.sort_key) {
            return Err(StoreError::AlreadyExists {
                partition_key: record.partition_key,
                sort_key: record.sort_key,
            });
        }
        partition.insert(record.sort_key, record.attributes);
        Ok(())
    }

    async fn batch_put(&self, records: Vec<StoreRecord>) -> Result<(), StoreError> {
        let mut partitions = self.partitions.lock().unwrap();
        for record in &records {
            if partitions
                .get(&record.partition_key)
                .is_some_and(|p| p.contains_key(&record.sort_key))
            {
                return Err(self.unavailable(&format!(
                    "batch rejected: key ({}, {}) already exists",
                    record.partition_key, record.sort_key
                )));
            }
        }
        for record in records {
            partitions
                .entry(record.partition_key)
                .or_default()
                .insert(record.sort_key, record.attributes);
        }
        Ok(())
    }

    async fn query(&self, query: StoreQuery) -> Result<StorePage, StoreError> {
        self.check_query_budget()?;

        let partitions = self.partitions.lock().unwrap();
        let mut matching: Vec<(i64, Attributes)> = partitions
            .get(&query.partition_key)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|(sort_key, _)| query.range.contains(**sort_key))
                    .map(|(sort_key, attributes)| (*sort_key, attributes.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if query.direction == Direction::Descending {
            matching.reverse();
        }

        // Resume strictly after the token, in the query's direction.
        if let Some(token) = query.start {
            matching.retain(|(sort_key, _)| match query.direction {
                Direction::Ascending => *sort_key > token.last_sort_key,
                Direction::Descending => *sort_key < token.last_sort_key,
            });
        }

        let page_len = query
            .limit
            .map_or(self.page_size, |limit| limit.min(self.page_size));
        let has_more = matching.len() > page_len;
        matching.truncate(page_len);

        let next = if has_more {
            matching.last().map(|(sort_key, _)| PageToken {
                last_sort_key: *sort_key,
            })
        } else {
            None
        };

        let records = matching
            .into_iter()
            .map(|(sort_key, attributes)| StoreRecord {
                partition_key: query.partition_key.clone(),
                sort_key,
                attributes,
            })
            .collect();

        Ok(StorePage { records, next })
    }
}

/// A store that fails every operation with `StoreError::Unavailable`. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingPartitionStore {
    store_id: String,
}

impl FailingPartitionStore {
    /// Creates a store that always reports `store_id` as unavailable.
    #[must_use]
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
        }
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable {
            store: self.store_id.clone(),
            message: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl PartitionStore for FailingPartitionStore {
    fn store_id(&self) -> &str {
        &self.store_id
    }

    async fn conditional_put(&self, _record: StoreRecord) -> Result<(), StoreError> {
        Err(self.unavailable())
    }

    async fn batch_put(&self, _records: Vec<StoreRecord>) -> Result<(), StoreError> {
        Err(self.unavailable())
    }

    async fn query(&self, _query: StoreQuery) -> Result<StorePage, StoreError> {
        Err(self.unavailable())
    }
}
