//! Shared test stores and utilities for the Chronicle event store.

mod clock;
mod store;

pub use clock::FixedClock;
pub use store::{FailingPartitionStore, MemoryPartitionStore};
