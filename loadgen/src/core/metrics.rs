//! Run metrics store
//!
//! Every probe outcome passes through [`MetricsStore::record`], which updates
//! the counters, the availability machine and the attempt log under one lock.
//! Checking and setting the first-failure / first-recovery stamps is therefore
//! a single critical section: two workers can never both open the episode.

use shared::{
    harness_info, AvailabilityConfig, AvailabilityState, Component, ProbeAttempt,
    ProbeOutcome, RecoveryCompletion, RunMetrics, RunTimestamp, Transition,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

use super::availability::AvailabilityMachine;
use super::clock::RunClock;

/// Result of recording one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub seq: u64,
    pub at: RunTimestamp,
    pub transition: Option<Transition>,
}

/// Immutable copy of everything collected, taken once the workers are stopped
#[derive(Debug, Clone)]
pub struct FrozenRun {
    pub metrics: RunMetrics,
    pub attempts: Vec<ProbeAttempt>,
    pub started_at: RunTimestamp,
    pub ended_at: RunTimestamp,
}

struct StoreInner {
    metrics: RunMetrics,
    machine: AvailabilityMachine,
    attempts: Vec<ProbeAttempt>,
    next_seq: u64,
    last_offset: Option<Duration>,
    frozen: bool,
}

pub struct MetricsStore {
    inner: Mutex<StoreInner>,
    clock: RunClock,
    state_tx: watch::Sender<AvailabilityState>,
}

impl MetricsStore {
    pub fn new(config: &AvailabilityConfig, clock: RunClock) -> Self {
        let (state_tx, _) = watch::channel(AvailabilityState::Stable);
        Self {
            inner: Mutex::new(StoreInner {
                metrics: RunMetrics::new(),
                machine: AvailabilityMachine::new(config),
                attempts: Vec::new(),
                next_seq: 1,
                last_offset: None,
                frozen: false,
            }),
            clock,
            state_tx,
        }
    }

    pub fn clock(&self) -> &RunClock {
        &self.clock
    }

    /// Record one attempt. Returns `None` once the store has been frozen.
    pub fn record(&self, worker: u32, latency: Duration, outcome: ProbeOutcome) -> Option<Recorded> {
        let recorded = {
            let mut inner = self.lock();
            if inner.frozen {
                return None;
            }

            let at = Self::stamp(&self.clock, &mut inner);
            let seq = inner.next_seq;
            inner.next_seq += 1;

            let success = outcome.is_success();
            if success {
                inner.metrics.success_count += 1;
            } else {
                inner.metrics.failure_count += 1;
            }

            let previous = inner.machine.state();
            let transition = match inner.machine.observe(success, at.offset) {
                Some(next) => Some(self.apply_transition(&mut inner, previous, next, at, Some(seq))),
                None => {
                    if !success && previous == AvailabilityState::Recovered {
                        inner.metrics.post_recovery_failures += 1;
                    }
                    None
                }
            };

            inner.attempts.push(ProbeAttempt {
                seq,
                worker,
                timestamp: at.wall,
                offset: at.offset,
                latency,
                outcome,
            });

            Recorded { seq, at, transition }
        };

        if let Some(transition) = &recorded.transition {
            log_transition(transition);
        }
        Some(recorded)
    }

    /// Close the episode when the monitoring budget runs out or the run is aborted
    pub fn close_episode(&self, completion: RecoveryCompletion) -> Option<Transition> {
        let transition = {
            let mut inner = self.lock();
            let previous = inner.machine.state();
            inner.machine.close()?;
            let at = Self::stamp(&self.clock, &mut inner);
            inner.metrics.recovery_completion = Some(completion);
            self.apply_transition(&mut inner, previous, AvailabilityState::Recovered, at, None)
        };
        log_transition(&transition);
        Some(transition)
    }

    pub fn set_baseline_tps(&self, tps: f64) {
        self.lock().machine.set_baseline_tps(tps);
    }

    pub fn snapshot(&self) -> RunMetrics {
        self.lock().metrics.clone()
    }

    pub fn state(&self) -> AvailabilityState {
        self.lock().machine.state()
    }

    pub fn success_count(&self) -> u64 {
        self.lock().metrics.success_count
    }

    pub fn failure_count(&self) -> u64 {
        self.lock().metrics.failure_count
    }

    pub fn attempts(&self) -> Vec<ProbeAttempt> {
        self.lock().attempts.clone()
    }

    /// Success rate over the last `n` attempts, `None` before any attempt
    pub fn recent_success_rate(&self, n: usize) -> Option<f64> {
        let inner = self.lock();
        let start = inner.attempts.len().saturating_sub(n);
        let recent = &inner.attempts[start..];
        if recent.is_empty() {
            return None;
        }
        let successes = recent.iter().filter(|a| a.is_success()).count();
        Some(successes as f64 / recent.len() as f64)
    }

    /// Successes per second over the configured trailing window, as of now
    pub fn trailing_tps(&self) -> f64 {
        let now = self.clock.elapsed();
        self.lock().machine.trailing_tps(now)
    }

    /// Receiver that observes every availability state change
    pub fn subscribe(&self) -> watch::Receiver<AvailabilityState> {
        self.state_tx.subscribe()
    }

    /// Stop accepting attempts and return a consistent copy of the run
    pub fn freeze(&self) -> FrozenRun {
        let mut inner = self.lock();
        inner.frozen = true;
        let ended_at = match inner.last_offset {
            Some(last) => self.clock.at(last.max(self.clock.elapsed())),
            None => self.clock.now(),
        };
        FrozenRun {
            metrics: inner.metrics.clone(),
            attempts: inner.attempts.clone(),
            started_at: self.clock.at(Duration::ZERO),
            ended_at,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Nothing panics while holding the lock; recover the data if something ever does
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offsets are strictly increasing in sequence order
    fn stamp(clock: &RunClock, inner: &mut StoreInner) -> RunTimestamp {
        let mut offset = clock.elapsed();
        if let Some(last) = inner.last_offset {
            if offset <= last {
                offset = last + Duration::from_nanos(1);
            }
        }
        inner.last_offset = Some(offset);
        clock.at(offset)
    }

    fn apply_transition(
        &self,
        inner: &mut StoreInner,
        from: AvailabilityState,
        to: AvailabilityState,
        at: RunTimestamp,
        trigger_seq: Option<u64>,
    ) -> Transition {
        match to {
            AvailabilityState::Downtime => {
                inner.metrics.first_failure.get_or_insert(at);
            }
            AvailabilityState::Recovering => {
                inner.metrics.first_recovery.get_or_insert(at);
            }
            AvailabilityState::Recovered => {
                inner.metrics.stable_again.get_or_insert(at);
                inner
                    .metrics
                    .recovery_completion
                    .get_or_insert(RecoveryCompletion::ThroughputRestored);
            }
            AvailabilityState::Stable => {}
        }

        let transition = Transition {
            from,
            to,
            at,
            trigger_seq,
        };
        inner.metrics.state = to;
        inner.metrics.transitions.push(transition.clone());
        self.state_tx.send_replace(to);
        transition
    }
}

fn log_transition(transition: &Transition) {
    let offset_secs = transition.at.offset.as_secs_f64();
    match transition.to {
        AvailabilityState::Downtime => harness_info!(
            Component::Availability,
            seq = ?transition.trigger_seq,
            offset_secs,
            "❌ FAILURE DETECTED at {}",
            transition.at.wall.format("%H:%M:%S%.3f")
        ),
        AvailabilityState::Recovering => harness_info!(
            Component::Availability,
            seq = ?transition.trigger_seq,
            offset_secs,
            "✅ RECOVERY DETECTED at {}",
            transition.at.wall.format("%H:%M:%S%.3f")
        ),
        _ => harness_info!(
            Component::Availability,
            offset_secs,
            "🟢 {} -> {}",
            transition.from,
            transition.to
        ),
    }
}
