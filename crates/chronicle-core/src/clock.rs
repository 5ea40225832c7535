//! Write-time clock.

use chrono::{DateTime, Utc};

/// Source of the `created_at` stamp recorders apply at write time. Swapping
/// the clock lets tests pin insertion timestamps.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
