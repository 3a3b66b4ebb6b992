//! Run record fixtures for report and verdict tests
//!
//! Records are built by hand with fixed wall-clock times so summaries are
//! fully deterministic.

use chrono::{DateTime, TimeZone, Utc};
use orchestrator::{BaselineSnapshot, RpoMeasurement, RunPhase, RunRecord, ServerIdentity};
use shared::{
    AvailabilityState, FailureKind, HarnessConfig, ProbeAttempt, ProbeMode, ProbeOutcome,
    RecoveryCompletion, RunId, RunMetrics, RunTimestamp, Transition,
};
use std::time::Duration;

use super::fakes::{PRIMARY, STANDBY};

pub struct TestFixtures;

impl TestFixtures {
    pub const RUN_ID: &'static str = "550e8400-e29b-41d4-a716-446655440001";
    /// Probe spacing used by every generated record
    pub const PERIOD_MS: u64 = 100;

    pub fn run_id() -> RunId {
        RunId::from_string(Self::RUN_ID).expect("valid run id")
    }

    pub fn run_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
    }

    pub fn at(offset_ms: u64) -> RunTimestamp {
        let offset = Duration::from_millis(offset_ms);
        RunTimestamp {
            wall: Self::run_start() + chrono::Duration::milliseconds(offset_ms as i64),
            offset,
        }
    }

    pub fn identity(address: &str) -> ServerIdentity {
        ServerIdentity {
            address: Some(address.to_string()),
            port: Some(5432),
            database: "orders".to_string(),
            version: "PostgreSQL 16.4".to_string(),
        }
    }

    /// `count` attempts one period apart; `failed(offset_ms)` decides which fail
    pub fn attempts(count: u64, failed: impl Fn(u64) -> bool) -> Vec<ProbeAttempt> {
        (0..count)
            .map(|i| {
                let offset_ms = i * Self::PERIOD_MS;
                let stamp = Self::at(offset_ms);
                let (outcome, latency) = if failed(offset_ms) {
                    (
                        ProbeOutcome::failure(FailureKind::ConnectionRefused, "connection refused"),
                        Duration::from_millis(2),
                    )
                } else {
                    (ProbeOutcome::Success, Duration::from_millis(10 + i % 5))
                };
                ProbeAttempt {
                    seq: i + 1,
                    worker: (i % 2) as u32,
                    timestamp: stamp.wall,
                    offset: stamp.offset,
                    latency,
                    outcome,
                }
            })
            .collect()
    }

    pub fn all_phases() -> Vec<RunPhase> {
        vec![
            RunPhase::Setup,
            RunPhase::Baseline,
            RunPhase::TriggerWait,
            RunPhase::Monitoring,
            RunPhase::Reconciliation,
            RunPhase::Report,
        ]
    }

    /// Thirty seconds of uninterrupted load, every write persisted
    pub fn healthy_record() -> RunRecord {
        let attempts = Self::attempts(300, |_| false);
        let metrics = Self::counted(&attempts);
        RunRecord {
            run_id: Self::run_id(),
            target: "postgres://app@db.internal:5432/orders".to_string(),
            probe_mode: ProbeMode::Insert,
            config: HarnessConfig::default(),
            started_at: Self::at(0),
            ended_at: Self::at(30_000),
            baseline: Some(BaselineSnapshot::evaluate(
                100,
                100,
                Some(100),
                Duration::from_secs(10),
                0,
                2,
            )),
            rpo: RpoMeasurement::Measured {
                app_count: metrics.success_count,
                db_count: metrics.success_count,
                lost: 0,
            },
            metrics,
            attempts,
            identity_before: Some(Self::identity(PRIMARY)),
            identity_after: Some(Self::identity(PRIMARY)),
            trigger: Some(orchestrator::TriggerOutcome::NotRequired),
            completed_phases: Self::all_phases(),
            cancelled: false,
            warnings: Vec::new(),
        }
    }

    /// Sixty seconds of load, unreachable on `[fail_from_ms, recover_ms)`,
    /// stable again two seconds after recovery
    pub fn failover_record(fail_from_ms: u64, recover_ms: u64, lost: u64) -> RunRecord {
        let attempts = Self::attempts(600, |offset| offset >= fail_from_ms && offset < recover_ms);
        let mut metrics = Self::counted(&attempts);

        let failure = Self::at(fail_from_ms);
        let recovery = Self::at(recover_ms);
        let stable = Self::at(recover_ms + 2_000);
        metrics.first_failure = Some(failure);
        metrics.first_recovery = Some(recovery);
        metrics.stable_again = Some(stable);
        metrics.recovery_completion = Some(RecoveryCompletion::ThroughputRestored);
        metrics.state = AvailabilityState::Recovered;
        metrics.transitions = vec![
            Self::transition(AvailabilityState::Stable, AvailabilityState::Downtime, failure),
            Self::transition(AvailabilityState::Downtime, AvailabilityState::Recovering, recovery),
            Self::transition(AvailabilityState::Recovering, AvailabilityState::Recovered, stable),
        ];

        let app_count = metrics.success_count;
        RunRecord {
            metrics,
            attempts,
            ended_at: Self::at(60_000),
            rpo: RpoMeasurement::Measured {
                app_count,
                db_count: app_count - lost,
                lost,
            },
            identity_after: Some(Self::identity(STANDBY)),
            ..Self::healthy_record()
        }
    }

    fn transition(from: AvailabilityState, to: AvailabilityState, at: RunTimestamp) -> Transition {
        Transition {
            from,
            to,
            at,
            trigger_seq: Some(at.offset.as_millis() as u64 / Self::PERIOD_MS + 1),
        }
    }

    fn counted(attempts: &[ProbeAttempt]) -> RunMetrics {
        let successes = attempts.iter().filter(|a| a.is_success()).count() as u64;
        RunMetrics {
            success_count: successes,
            failure_count: attempts.len() as u64 - successes,
            ..RunMetrics::new()
        }
    }
}
