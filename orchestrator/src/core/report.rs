//! Report generation
//!
//! Everything here is a pure function of a [`RunRecord`]: no clock reads, no
//! shared state, ordered collections only. Summarizing the same record twice
//! yields byte-identical JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use shared::{FailureKind, ProbeAttempt, Thresholds};
use std::collections::BTreeMap;
use std::fmt;

use super::phase::{incomplete_phases, RunPhase};
use crate::error::OrchestratorResult;
use crate::types::{
    BaselineSnapshot, ComponentVerdict, FailoverResult, LatencyStats, RpoMeasurement, RunRecord,
    RunSummary, ServerReport, Totals, TriggerOutcome, VerdictTable,
};

pub const TIMESERIES_HEADER: &str =
    "seq,timestamp,offset_ms,worker,success,duration_ms,failure_kind,error";

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn summarize(record: &RunRecord, thresholds: &Thresholds) -> RunSummary {
        let failover = failover_result(record);
        let totals = totals(record);
        let latency = latency_stats(&record.attempts);
        let server = server_report(record);
        let verdict = VerdictTable::new(
            baseline_verdict(record.baseline.as_ref()),
            rto_verdict(&failover, thresholds),
            rpo_verdict(&failover.rpo, thresholds),
        );
        let warnings = warnings(record, &failover, &server);
        let incomplete_sections = incomplete_sections(record, &failover, &server, latency.is_none());

        RunSummary {
            run_id: record.run_id.to_string(),
            target: record.target.clone(),
            probe_mode: record.probe_mode,
            started_at: record.started_at.wall,
            ended_at: record.ended_at.wall,
            duration_secs: record.ended_at.since(&record.started_at).as_secs_f64(),
            cancelled: record.cancelled,
            config: record.config.clone(),
            baseline: record.baseline.clone(),
            trigger: record.trigger.clone(),
            failover,
            totals,
            latency,
            server,
            transitions: record.metrics.transitions.clone(),
            verdict,
            warnings,
            incomplete_sections,
        }
    }

    /// One row per attempt, in sequence order
    pub fn timeseries_csv(attempts: &[ProbeAttempt]) -> String {
        let mut csv = String::with_capacity(64 * (attempts.len() + 1));
        csv.push_str(TIMESERIES_HEADER);
        csv.push('\n');

        for attempt in attempts {
            let kind = attempt
                .outcome
                .failure_kind()
                .map(|k| k.as_str())
                .unwrap_or("");
            let error = attempt.error_detail().map(csv_field).unwrap_or_default();
            csv.push_str(&format!(
                "{},{},{},{},{},{:.3},{},{}\n",
                attempt.seq,
                attempt.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                attempt.offset.as_millis(),
                attempt.worker,
                attempt.is_success(),
                millis(attempt.latency),
                kind,
                error
            ));
        }
        csv
    }

    pub fn to_json(summary: &RunSummary) -> OrchestratorResult<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }

    pub fn timeseries_file_name(run_id: &str) -> String {
        format!("timeseries-{run_id}.csv")
    }

    pub fn summary_file_name(run_id: &str) -> String {
        format!("summary-{run_id}.json")
    }
}

fn millis(duration: std::time::Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn failover_result(record: &RunRecord) -> FailoverResult {
    let metrics = &record.metrics;
    let rto_lower_bound_seconds = match (&metrics.first_failure, &metrics.first_recovery) {
        (Some(failure), None) => Some(record.ended_at.since(failure).as_secs_f64()),
        _ => None,
    };

    let post_recovery_tps = metrics.first_recovery.as_ref().and_then(|recovery| {
        let window = record.ended_at.since(recovery).as_secs_f64();
        if window <= 0.0 {
            return None;
        }
        let successes = record
            .attempts
            .iter()
            .filter(|a| a.is_success() && a.offset >= recovery.offset)
            .count();
        Some(successes as f64 / window)
    });

    let tps_recovery_ratio = match (post_recovery_tps, &record.baseline) {
        (Some(post), Some(baseline)) if baseline.baseline_tps > 0.0 => Some(post / baseline.baseline_tps),
        _ => None,
    };

    FailoverResult {
        failover_detected: metrics.failover_detected(),
        first_failure_at: metrics.first_failure.map(|t| t.wall),
        first_recovery_at: metrics.first_recovery.map(|t| t.wall),
        stable_again_at: metrics.stable_again.map(|t| t.wall),
        rto_seconds: metrics.rto().map(|rto| rto.as_secs_f64()),
        rto_lower_bound_seconds,
        rpo: record.rpo.clone(),
        post_recovery_tps,
        tps_recovery_ratio,
        recovery_completion: metrics.recovery_completion,
        post_recovery_failures: metrics.post_recovery_failures,
    }
}

fn totals(record: &RunRecord) -> Totals {
    let mut failures_by_kind: BTreeMap<FailureKind, u64> = BTreeMap::new();
    for kind in record.attempts.iter().filter_map(|a| a.outcome.failure_kind()) {
        *failures_by_kind.entry(kind).or_default() += 1;
    }

    let attempts = record.metrics.total_attempts();
    Totals {
        attempts,
        successes: record.metrics.success_count,
        failures: record.metrics.failure_count,
        success_rate: (attempts > 0).then(|| record.metrics.success_count as f64 / attempts as f64),
        failures_by_kind,
    }
}

/// Latency over successful attempts; failure latency mostly measures the timeout
fn latency_stats(attempts: &[ProbeAttempt]) -> Option<LatencyStats> {
    let mut samples: Vec<f64> = attempts
        .iter()
        .filter(|a| a.is_success())
        .map(|a| millis(a.latency))
        .collect();
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.total_cmp(b));

    let n = samples.len();
    let median = if n % 2 == 0 {
        (samples[n / 2 - 1] + samples[n / 2]) / 2.0
    } else {
        samples[n / 2]
    };
    // Nearest-rank percentile
    let p95_rank = ((n as f64) * 0.95).ceil() as usize;

    Some(LatencyStats {
        samples: n as u64,
        avg_ms: samples.iter().sum::<f64>() / n as f64,
        median_ms: median,
        p95_ms: samples[p95_rank.clamp(1, n) - 1],
        max_ms: samples[n - 1],
    })
}

fn server_report(record: &RunRecord) -> ServerReport {
    let primary_changed = match (&record.identity_before, &record.identity_after) {
        (Some(before), Some(after)) => Some(before.endpoint() != after.endpoint()),
        _ => None,
    };
    ServerReport {
        before: record.identity_before.clone(),
        after: record.identity_after.clone(),
        primary_changed,
    }
}

fn baseline_verdict(baseline: Option<&BaselineSnapshot>) -> ComponentVerdict {
    let Some(baseline) = baseline else {
        return ComponentVerdict::skipped("baseline phase did not complete");
    };
    match (baseline.consistent, baseline.pre_failover_db_count) {
        (Some(true), Some(db)) => ComponentVerdict::pass(format!(
            "application {} / database {} within ±{}",
            baseline.pre_failover_app_count, db, baseline.tolerance
        )),
        (Some(false), Some(db)) => ComponentVerdict::fail(format!(
            "application {} / database {} differ by more than {} before any failover",
            baseline.pre_failover_app_count, db, baseline.tolerance
        )),
        _ => ComponentVerdict::skipped("no database count to compare"),
    }
}

fn rto_verdict(failover: &FailoverResult, thresholds: &Thresholds) -> ComponentVerdict {
    if !failover.failover_detected {
        return ComponentVerdict::fail("no failover observed");
    }
    match (failover.rto_seconds, failover.rto_lower_bound_seconds) {
        (Some(rto), _) if rto <= thresholds.rto_threshold_secs => ComponentVerdict::pass(format!(
            "{rto:.3}s <= {}s",
            thresholds.rto_threshold_secs
        )),
        (Some(rto), _) => ComponentVerdict::fail(format!(
            "{rto:.3}s > {}s",
            thresholds.rto_threshold_secs
        )),
        (None, Some(lower)) => ComponentVerdict::fail(format!(
            "no recovery observed; downtime of at least {lower:.3}s"
        )),
        (None, None) => ComponentVerdict::fail("no recovery observed"),
    }
}

fn rpo_verdict(rpo: &RpoMeasurement, thresholds: &Thresholds) -> ComponentVerdict {
    match rpo {
        RpoMeasurement::Measured { lost, .. } if *lost <= thresholds.rpo_threshold => {
            ComponentVerdict::pass(format!("{lost} lost <= {}", thresholds.rpo_threshold))
        }
        RpoMeasurement::Measured { lost, .. } => {
            ComponentVerdict::fail(format!("{lost} lost > {}", thresholds.rpo_threshold))
        }
        RpoMeasurement::Anomaly { surplus, .. } => ComponentVerdict::fail(format!(
            "database holds {surplus} more rows than recorded successes"
        )),
        RpoMeasurement::Unknown { attempts, .. } => ComponentVerdict::fail(format!(
            "row count unavailable after {attempts} attempts"
        )),
        RpoMeasurement::NotApplicable => {
            ComponentVerdict::skipped("connectivity probes write no rows")
        }
    }
}

fn warnings(record: &RunRecord, failover: &FailoverResult, server: &ServerReport) -> Vec<String> {
    let mut warnings = record.warnings.clone();

    if let Some(baseline) = &record.baseline {
        if let (Some(false), Some(db)) = (baseline.consistent, baseline.pre_failover_db_count) {
            warnings.push(format!(
                "Baseline mismatch: application counted {} successes, database holds {} rows",
                baseline.pre_failover_app_count, db
            ));
        }
        if baseline.failures_during_baseline > 0 {
            warnings.push(format!(
                "{} probe failures during the baseline phase",
                baseline.failures_during_baseline
            ));
        }
    }

    match &failover.rpo {
        RpoMeasurement::Anomaly { app_count, db_count, surplus } => warnings.push(format!(
            "Measurement anomaly: database holds {db_count} rows but only {app_count} writes succeeded ({surplus} surplus)"
        )),
        RpoMeasurement::Unknown { attempts, last_error, .. } => warnings.push(format!(
            "RPO unknown: count query failed {attempts} times, last error: {last_error}"
        )),
        _ => {}
    }

    if failover.failover_detected && failover.first_recovery_at.is_none() {
        warnings.push("Failure observed but service never recovered".to_string());
    }
    if failover.post_recovery_failures > 0 {
        warnings.push(format!(
            "Flapping: {} failures after the episode closed; only the first episode is measured",
            failover.post_recovery_failures
        ));
    }

    match &record.trigger {
        Some(TriggerOutcome::TimedOut { waited_secs }) => warnings.push(format!(
            "No trigger signal within {waited_secs:.0}s; monitoring continued"
        )),
        Some(TriggerOutcome::InputClosed) => {
            warnings.push("Standard input closed before a trigger signal".to_string())
        }
        _ => {}
    }

    if failover.failover_detected && server.primary_changed == Some(false) {
        warnings.push("Server address unchanged across the failover".to_string());
    }
    if record.cancelled {
        warnings.push("Run cancelled by operator".to_string());
    }
    warnings
}

fn incomplete_sections(
    record: &RunRecord,
    failover: &FailoverResult,
    server: &ServerReport,
    no_latency: bool,
) -> Vec<String> {
    let mut sections: Vec<String> = incomplete_phases(&record.completed_phases)
        .into_iter()
        .map(|phase| phase.to_string())
        .collect();

    if let Some(baseline) = &record.baseline {
        if record.probe_mode.writes_rows() && baseline.pre_failover_db_count.is_none() {
            sections.push("baseline.db_count".to_string());
        }
    }
    if failover.failover_detected && failover.rto_seconds.is_none() {
        sections.push("rto".to_string());
    }
    if matches!(failover.rpo, RpoMeasurement::Unknown { .. }) {
        sections.push("rpo".to_string());
    }
    if server.before.is_none() {
        sections.push("server.before".to_string());
    }
    if server.after.is_none() {
        sections.push("server.after".to_string());
    }
    if no_latency {
        sections.push("latency".to_string());
    }
    if !record.completed_phases.contains(&RunPhase::Reconciliation) {
        sections.push(RunPhase::Reconciliation.to_string());
    }
    sections
}

/// Human-readable end-of-run summary
pub struct ConsoleSummary<'a>(pub &'a RunSummary);

impl fmt::Display for ConsoleSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        let rule = "=".repeat(70);
        writeln!(f, "{rule}")?;
        writeln!(f, "FAILOVER TEST SUMMARY  run {}", s.run_id)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Target:          {} ({})", s.target, s.probe_mode)?;
        writeln!(f, "Duration:        {:.1}s", s.duration_secs)?;
        writeln!(
            f,
            "Attempts:        {} ({} ok, {} failed{})",
            s.totals.attempts,
            s.totals.successes,
            s.totals.failures,
            s.totals
                .success_rate
                .map(|r| format!(", {:.2}% success", r * 100.0))
                .unwrap_or_default()
        )?;
        for (kind, count) in &s.totals.failures_by_kind {
            writeln!(f, "  {kind:<22} {count}")?;
        }
        if let Some(latency) = &s.latency {
            writeln!(
                f,
                "Latency (ok):    avg {:.1}ms  median {:.1}ms  p95 {:.1}ms  max {:.1}ms",
                latency.avg_ms, latency.median_ms, latency.p95_ms, latency.max_ms
            )?;
        }
        if let Some(baseline) = &s.baseline {
            writeln!(
                f,
                "Baseline:        {:.1} TPS over {:.0}s, app {} / db {}",
                baseline.baseline_tps,
                baseline.duration_secs,
                baseline.pre_failover_app_count,
                baseline
                    .pre_failover_db_count
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "n/a".to_string())
            )?;
        }

        let failover = &s.failover;
        if failover.failover_detected {
            writeln!(f, "Failover:        detected")?;
            writeln!(f, "  First failure:  {}", clock_time(failover.first_failure_at))?;
            writeln!(f, "  First recovery: {}", clock_time(failover.first_recovery_at))?;
            match (failover.rto_seconds, failover.rto_lower_bound_seconds) {
                (Some(rto), _) => writeln!(f, "  RTO:            {rto:.3}s")?,
                (None, Some(lower)) => writeln!(f, "  RTO:            > {lower:.3}s (no recovery)")?,
                (None, None) => writeln!(f, "  RTO:            unknown")?,
            }
        } else {
            writeln!(f, "Failover:        not detected (RTO undefined)")?;
        }

        match &failover.rpo {
            RpoMeasurement::Measured { app_count, db_count, lost } => {
                writeln!(f, "RPO:             {lost} lost (app {app_count} / db {db_count})")?
            }
            RpoMeasurement::Anomaly { app_count, db_count, surplus } => writeln!(
                f,
                "RPO:             ANOMALY, db has {surplus} extra (app {app_count} / db {db_count})"
            )?,
            RpoMeasurement::Unknown { attempts, .. } => {
                writeln!(f, "RPO:             unknown after {attempts} attempts")?
            }
            RpoMeasurement::NotApplicable => writeln!(f, "RPO:             not applicable")?,
        }
        if let Some(ratio) = failover.tps_recovery_ratio {
            writeln!(f, "TPS recovery:    {:.0}% of baseline", ratio * 100.0)?;
        }
        if let (Some(before), Some(after)) = (&s.server.before, &s.server.after) {
            writeln!(f, "Primary:         {} -> {}", before.endpoint(), after.endpoint())?;
        }

        writeln!(f, "{}", "-".repeat(70))?;
        writeln!(f, "RTO       {:<8} {}", s.verdict.rto.status, s.verdict.rto.detail)?;
        writeln!(f, "RPO       {:<8} {}", s.verdict.rpo.status, s.verdict.rpo.detail)?;
        writeln!(f, "Baseline  {:<8} {}", s.verdict.baseline.status, s.verdict.baseline.detail)?;
        writeln!(f, "OVERALL   {}", s.verdict.overall)?;

        if !s.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for warning in &s.warnings {
                writeln!(f, "  ⚠️  {warning}")?;
            }
        }
        if !s.incomplete_sections.is_empty() {
            writeln!(f, "Incomplete:      {}", s.incomplete_sections.join(", "))?;
        }
        write!(f, "{rule}")
    }
}

fn clock_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "-".to_string())
}
