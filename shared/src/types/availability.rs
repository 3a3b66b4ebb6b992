//! Availability state and the frozen run metrics snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::duration_format;

/// Point in a run: wall-clock for humans, monotonic offset for arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTimestamp {
    pub wall: DateTime<Utc>,
    #[serde(rename = "offset_ms", with = "duration_format::millis")]
    pub offset: Duration,
}

impl RunTimestamp {
    /// Elapsed time from `earlier` to `self`, zero if `earlier` is later
    pub fn since(&self, earlier: &RunTimestamp) -> Duration {
        self.offset.saturating_sub(earlier.offset)
    }
}

/// States of the availability state machine for one failover episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityState {
    /// Healthy, no failure observed yet
    Stable,
    /// First failure seen; waiting for the first success
    Downtime,
    /// Connectivity restored; waiting for throughput to return
    Recovering,
    /// Stable again after the instrumented episode
    Recovered,
}

impl AvailabilityState {
    pub fn is_stable(&self) -> bool {
        matches!(self, AvailabilityState::Stable | AvailabilityState::Recovered)
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityState::Stable => write!(f, "STABLE"),
            AvailabilityState::Downtime => write!(f, "DOWNTIME"),
            AvailabilityState::Recovering => write!(f, "RECOVERING"),
            AvailabilityState::Recovered => write!(f, "RECOVERED"),
        }
    }
}

/// Why the episode left `Recovering`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryCompletion {
    /// Trailing throughput reached the configured fraction of baseline
    ThroughputRestored,
    /// The monitoring budget ran out first
    BudgetExpired,
    /// The operator aborted the run
    Cancelled,
}

/// A recorded state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: AvailabilityState,
    pub to: AvailabilityState,
    pub at: RunTimestamp,
    /// Sequence number of the attempt that caused it, if any
    pub trigger_seq: Option<u64>,
}

/// Snapshot of the shared run counters and availability timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub success_count: u64,
    pub failure_count: u64,
    pub first_failure: Option<RunTimestamp>,
    pub first_recovery: Option<RunTimestamp>,
    pub stable_again: Option<RunTimestamp>,
    pub recovery_completion: Option<RecoveryCompletion>,
    /// Failures seen after the instrumented episode closed
    pub post_recovery_failures: u64,
    pub state: AvailabilityState,
    pub transitions: Vec<Transition>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            first_failure: None,
            first_recovery: None,
            stable_again: None,
            recovery_completion: None,
            post_recovery_failures: 0,
            state: AvailabilityState::Stable,
            transitions: Vec::new(),
        }
    }

    pub fn total_attempts(&self) -> u64 {
        self.success_count + self.failure_count
    }

    pub fn failover_detected(&self) -> bool {
        self.first_failure.is_some()
    }

    /// First failure to first recovery; `None` unless both were observed
    pub fn rto(&self) -> Option<Duration> {
        match (&self.first_failure, &self.first_recovery) {
            (Some(failure), Some(recovery)) => Some(recovery.since(failure)),
            _ => None,
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
