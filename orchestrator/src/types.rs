//! Run record, summary and verdict types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    FailureKind, HarnessConfig, ProbeAttempt, ProbeMode, RecoveryCompletion, RunId, RunMetrics,
    RunTimestamp, Transition,
};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::core::phase::RunPhase;

/// Which server answered, as seen from SQL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    /// `None` when connected over a Unix socket
    pub address: Option<String>,
    pub port: Option<i32>,
    pub database: String,
    pub version: String,
}

impl ServerIdentity {
    pub fn endpoint(&self) -> String {
        match (&self.address, self.port) {
            (Some(address), Some(port)) => format!("{address}:{port}"),
            (Some(address), None) => address.clone(),
            _ => "local socket".to_string(),
        }
    }
}

/// Application and database counts at the end of the baseline phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub pre_failover_app_count: u64,
    /// Absent in connectivity mode or when the count query failed
    pub pre_failover_db_count: Option<u64>,
    pub baseline_tps: f64,
    pub duration_secs: f64,
    pub failures_during_baseline: u64,
    /// Allowed gap between the counts, one in-flight write per worker
    pub tolerance: u64,
    /// `None` when there is no database count to compare against
    pub consistent: Option<bool>,
}

impl BaselineSnapshot {
    /// Compare counts. `app_before` and `app_after` bracket the count query so
    /// writes that commit while it runs are not mistaken for a mismatch.
    pub fn evaluate(
        app_before: u64,
        app_after: u64,
        db_count: Option<u64>,
        elapsed: Duration,
        failures: u64,
        tolerance: u64,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let baseline_tps = if secs > 0.0 { app_before as f64 / secs } else { 0.0 };
        let consistent = db_count.map(|db| {
            db + tolerance >= app_before && db <= app_after.saturating_add(tolerance)
        });

        Self {
            pre_failover_app_count: app_before,
            pre_failover_db_count: db_count,
            baseline_tps,
            duration_secs: secs,
            failures_during_baseline: failures,
            tolerance,
            consistent,
        }
    }
}

/// Outcome of comparing the application's success count with the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RpoMeasurement {
    Measured {
        app_count: u64,
        db_count: u64,
        lost: u64,
    },
    /// The database holds more tagged rows than the application saw succeed
    Anomaly {
        app_count: u64,
        db_count: u64,
        surplus: u64,
    },
    /// The count query never succeeded
    Unknown {
        app_count: u64,
        attempts: u32,
        last_error: String,
    },
    /// Connectivity probes write nothing, so there is nothing to reconcile
    NotApplicable,
}

impl RpoMeasurement {
    pub fn lost(&self) -> Option<u64> {
        match self {
            RpoMeasurement::Measured { lost, .. } => Some(*lost),
            _ => None,
        }
    }
}

/// How the operator gate ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Signalled { source: String, waited_secs: f64 },
    /// The application saw a failure before any signal arrived
    FailureObserved { waited_secs: f64 },
    TimedOut { waited_secs: f64 },
    /// Standard input reached end-of-file without a line
    InputClosed,
    NotRequired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Skipped,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Pass => write!(f, "PASS"),
            VerdictStatus::Fail => write!(f, "FAIL"),
            VerdictStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentVerdict {
    pub status: VerdictStatus,
    pub detail: String,
}

impl ComponentVerdict {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Pass,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Fail,
            detail: detail.into(),
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Skipped,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictTable {
    pub baseline: ComponentVerdict,
    pub rto: ComponentVerdict,
    pub rpo: ComponentVerdict,
    /// `Pass` only if no component failed
    pub overall: VerdictStatus,
}

impl VerdictTable {
    pub fn new(baseline: ComponentVerdict, rto: ComponentVerdict, rpo: ComponentVerdict) -> Self {
        let failed = [&baseline, &rto, &rpo]
            .iter()
            .any(|v| v.status == VerdictStatus::Fail);
        Self {
            overall: if failed { VerdictStatus::Fail } else { VerdictStatus::Pass },
            baseline,
            rto,
            rpo,
        }
    }

    pub fn passed(&self) -> bool {
        self.overall == VerdictStatus::Pass
    }
}

/// Measured failover figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverResult {
    pub failover_detected: bool,
    pub first_failure_at: Option<DateTime<Utc>>,
    pub first_recovery_at: Option<DateTime<Utc>>,
    pub stable_again_at: Option<DateTime<Utc>>,
    /// Undefined, not zero, when no failure was observed
    pub rto_seconds: Option<f64>,
    /// Failure observed but never recovered: time from first failure to run end
    pub rto_lower_bound_seconds: Option<f64>,
    pub rpo: RpoMeasurement,
    pub post_recovery_tps: Option<f64>,
    pub tps_recovery_ratio: Option<f64>,
    pub recovery_completion: Option<RecoveryCompletion>,
    pub post_recovery_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: u64,
    pub avg_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: Option<f64>,
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReport {
    pub before: Option<ServerIdentity>,
    pub after: Option<ServerIdentity>,
    /// `None` unless both identities were captured
    pub primary_changed: Option<bool>,
}

/// Everything collected during a run; the report is a pure function of this
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: RunId,
    pub target: String,
    pub probe_mode: ProbeMode,
    pub config: HarnessConfig,
    pub started_at: RunTimestamp,
    pub ended_at: RunTimestamp,
    pub baseline: Option<BaselineSnapshot>,
    pub metrics: RunMetrics,
    pub attempts: Vec<ProbeAttempt>,
    pub rpo: RpoMeasurement,
    pub identity_before: Option<ServerIdentity>,
    pub identity_after: Option<ServerIdentity>,
    pub trigger: Option<TriggerOutcome>,
    pub completed_phases: Vec<RunPhase>,
    pub cancelled: bool,
    /// Warnings raised while running, in the order they occurred
    pub warnings: Vec<String>,
}

/// Machine-readable run summary written as `summary-<run>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub target: String,
    pub probe_mode: ProbeMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub cancelled: bool,
    pub config: HarnessConfig,
    pub baseline: Option<BaselineSnapshot>,
    pub trigger: Option<TriggerOutcome>,
    pub failover: FailoverResult,
    pub totals: Totals,
    pub latency: Option<LatencyStats>,
    pub server: ServerReport,
    pub transitions: Vec<Transition>,
    pub verdict: VerdictTable,
    pub warnings: Vec<String>,
    pub incomplete_sections: Vec<String>,
}
