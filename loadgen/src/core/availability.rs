//! Availability state machine
//!
//! Pure transition logic for one failover episode. Callers feed outcomes in the
//! order they were serialized and own the timestamps; the machine only sees run
//! offsets so it can be driven deterministically from tests.

use shared::{AvailabilityConfig, AvailabilityState};
use std::time::Duration;

use super::throughput::ThroughputWindow;

#[derive(Debug, Clone)]
pub struct AvailabilityMachine {
    state: AvailabilityState,
    stability_threshold: u32,
    recovery_threshold: f64,
    baseline_tps: Option<f64>,
    consecutive_successes: u32,
    window: ThroughputWindow,
}

impl AvailabilityMachine {
    pub fn new(config: &AvailabilityConfig) -> Self {
        Self {
            state: AvailabilityState::Stable,
            stability_threshold: config.stability_threshold,
            recovery_threshold: config.recovery_threshold,
            baseline_tps: None,
            consecutive_successes: 0,
            window: ThroughputWindow::new(config.throughput_window),
        }
    }

    pub fn state(&self) -> AvailabilityState {
        self.state
    }

    pub fn baseline_tps(&self) -> Option<f64> {
        self.baseline_tps
    }

    /// Enables the throughput gate on `Recovering -> Recovered`
    pub fn set_baseline_tps(&mut self, tps: f64) {
        if tps.is_finite() && tps > 0.0 {
            self.baseline_tps = Some(tps);
        }
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn trailing_tps(&mut self, at: Duration) -> f64 {
        self.window.tps(at)
    }

    /// Feed one outcome. Returns the new state if this outcome caused a transition.
    pub fn observe(&mut self, success: bool, at: Duration) -> Option<AvailabilityState> {
        if success {
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.window.record(at);
        } else {
            self.consecutive_successes = 0;
        }

        let next = match (self.state, success) {
            (AvailabilityState::Stable, false) => Some(AvailabilityState::Downtime),
            (AvailabilityState::Downtime, true) => Some(AvailabilityState::Recovering),
            (AvailabilityState::Recovering, true) if self.recovery_complete(at) => {
                Some(AvailabilityState::Recovered)
            }
            _ => None,
        };

        if let Some(state) = next {
            self.state = state;
        }
        next
    }

    /// Close the episode without throughput evidence (budget expiry or abort).
    ///
    /// Only an episode that has seen connectivity return can be closed; a run
    /// still in `Downtime` stays there so the report can show it never recovered.
    pub fn close(&mut self) -> Option<AvailabilityState> {
        if self.state == AvailabilityState::Recovering {
            self.state = AvailabilityState::Recovered;
            Some(self.state)
        } else {
            None
        }
    }

    fn recovery_complete(&mut self, at: Duration) -> bool {
        if self.consecutive_successes < self.stability_threshold {
            return false;
        }
        match self.baseline_tps {
            Some(baseline) => self.window.tps(at) >= self.recovery_threshold * baseline,
            None => true,
        }
    }
}
