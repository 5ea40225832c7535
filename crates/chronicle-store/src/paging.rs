//! Exhaustive pagination over the partitioned store.
//!
//! Every range read in the recorder core goes through [`collect_pages`]: it
//! follows the backend's continuation tokens until none remains or enough
//! records have been kept, and it propagates the first page failure
//! immediately, discarding records accumulated from earlier pages.

use chronicle_core::error::RecorderError;
use chronicle_core::store::{
    Direction, PartitionStore, SortRange, StoreError, StoreQuery, StoreRecord,
};

/// Converts a store-level failure into the recorder-level access error,
/// naming the affected store.
pub(crate) fn access_error(store: &dyn PartitionStore, err: &StoreError) -> RecorderError {
    RecorderError::Access {
        store: store.store_id().to_string(),
        message: err.to_string(),
    }
}

/// Fetches every matching record page by page.
///
/// `limit` caps the number of *kept* records: paging stops as soon as the cap
/// is reached. When `push_down_limit` is set the remaining budget is also
/// passed to the backend as a page limit; callers that filter records
/// client-side (`keep` discards some) must leave it unset, since a
/// backend-truncated page could under-return.
pub(crate) async fn collect_pages(
    store: &dyn PartitionStore,
    partition_key: &str,
    range: SortRange,
    direction: Direction,
    limit: Option<usize>,
    push_down_limit: bool,
    mut keep: impl FnMut(&StoreRecord) -> bool + Send,
) -> Result<Vec<StoreRecord>, RecorderError> {
    let mut kept = Vec::new();
    let mut start = None;

    loop {
        let page_limit = if push_down_limit {
            limit.map(|limit| limit - kept.len())
        } else {
            None
        };
        let page = store
            .query(StoreQuery {
                partition_key: partition_key.to_string(),
                range,
                direction,
                limit: page_limit,
                start,
            })
            .await
            .map_err(|err| access_error(store, &err))?;

        start = page.next;
        for record in page.records {
            if keep(&record) {
                kept.push(record);
            }
            if limit.is_some_and(|limit| kept.len() >= limit) {
                start = None;
                break;
            }
        }

        if start.is_none() {
            break;
        }
    }

    tracing::debug!(
        store = store.store_id(),
        partition = partition_key,
        count = kept.len(),
        "fetched records from store"
    );
    Ok(kept)
}
