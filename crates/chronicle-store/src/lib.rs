//! Chronicle Store — the recorder core.
//!
//! Three storage-backed recorders over any [`chronicle_core::store::PartitionStore`]:
//!
//! - [`AggregateRecorder`] appends and retrieves per-aggregate event
//!   sequences with optimistic concurrency on `(originator_id,
//!   originator_version)`.
//! - [`ApplicationRecorder`] additionally assigns every stored event a
//!   strictly increasing notification id and serves range queries over that
//!   global order.
//! - [`ProcessRecorder`] additionally keeps the owning application's tracking
//!   ledger over upstream notification logs.
//!
//! All concurrency safety is pushed to the backend's conditional-write
//! primitive; the recorders hold no locks and cache no state across calls.

mod aggregate_recorder;
mod application_recorder;
mod factory;
mod mapping;
mod paging;
mod process_recorder;

pub use aggregate_recorder::AggregateRecorder;
pub use application_recorder::ApplicationRecorder;
pub use factory::{Factory, StoreConfig};
pub use process_recorder::ProcessRecorder;
