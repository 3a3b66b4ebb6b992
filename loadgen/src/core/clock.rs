//! Run-relative clock

use chrono::{DateTime, Utc};
use shared::RunTimestamp;
use std::time::Duration;
use tokio::time::Instant;

/// Stamps events with a wall-clock time and a monotonic offset from run start.
///
/// The wall-clock component is derived from the monotonic offset, so stamps
/// taken in order are ordered in both representations even if the system
/// clock steps during the run. Uses tokio's clock so paused-time tests see
/// deterministic offsets.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started_at: DateTime<Utc>,
    origin: Instant,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            origin: Instant::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    pub fn now(&self) -> RunTimestamp {
        self.at(self.elapsed())
    }

    /// Timestamp for an arbitrary offset into the run
    pub fn at(&self, offset: Duration) -> RunTimestamp {
        let delta = chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero());
        RunTimestamp {
            wall: self.started_at + delta,
            offset,
        }
    }
}
