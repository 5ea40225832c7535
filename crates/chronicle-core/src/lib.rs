//! Chronicle Core — shared event store abstractions.
//!
//! This crate defines the data model, the recorder capability traits, and the
//! partitioned-store contract that backend adapters implement. It contains no
//! infrastructure code.

pub mod clock;
pub mod error;
pub mod event;
pub mod recorder;
pub mod store;
