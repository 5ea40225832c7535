//! Pinned clock for deterministic `created_at` stamps.

use chrono::{DateTime, Utc};
use chronicle_core::clock::Clock;

/// A clock frozen at the instant it was constructed with, so a test can
/// assert the exact stamp a recorder applied.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
