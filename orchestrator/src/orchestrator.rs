//! Main orchestrator implementation
//!
//! Drives one failover run through its phases with injected services:
//! setup, baseline, operator gate, monitoring, reconciliation and report.
//! Cancellation at any point skips straight to reconciliation and report,
//! marking the unfinished phases incomplete.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use loadgen::{LoadDriver, MetricsStore, Prober, RunClock};
use shared::{
    harness_info, harness_warn, logging, AvailabilityState, Component, HarnessConfig,
    RecoveryCompletion, RunId,
};

use crate::core::{PhaseLog, Reconciler, ReportGenerator, RunPhase};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{AuthoritativeStore, FileSystem, TriggerGate};
use crate::types::{
    BaselineSnapshot, RpoMeasurement, RunRecord, RunSummary, ServerIdentity, TriggerOutcome,
};

/// Window for the recent success rate in progress lines
const RECENT_WINDOW: usize = 50;

/// Summary plus the artifact files written for it
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub artifacts: Vec<PathBuf>,
}

/// Failover run orchestrator with dependency injection
pub struct Orchestrator<P, S, G, F>
where
    P: Prober + 'static,
    S: AuthoritativeStore,
    G: TriggerGate,
    F: FileSystem,
{
    run_id: RunId,
    target: String,
    config: HarnessConfig,
    reconciler: Reconciler,

    /// Injected services
    prober: Arc<P>,
    store: S,
    gate: G,
    file_system: F,

    cancel: CancellationToken,
}

/// State accumulated while phases run
struct RunState {
    phases: PhaseLog,
    warnings: Vec<String>,
    baseline: Option<BaselineSnapshot>,
    trigger: Option<TriggerOutcome>,
}

impl<P, S, G, F> Orchestrator<P, S, G, F>
where
    P: Prober + 'static,
    S: AuthoritativeStore,
    G: TriggerGate,
    F: FileSystem,
{
    pub fn new(
        run_id: RunId,
        target: impl Into<String>,
        config: HarnessConfig,
        prober: Arc<P>,
        store: S,
        gate: G,
        file_system: F,
    ) -> Self {
        Self {
            run_id,
            target: target.into(),
            reconciler: Reconciler::new(config.reconcile.clone()),
            config,
            prober,
            store,
            gate,
            file_system,
            cancel: CancellationToken::new(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Token that aborts the run; cancelling it still produces a report
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every phase. Only setup, configuration and artifact errors are
    /// returned as `Err`; everything else ends up in the summary.
    pub async fn run(&self) -> OrchestratorResult<RunOutcome> {
        self.config.validate()?;
        let mut state = RunState {
            phases: PhaseLog::new(),
            warnings: Vec::new(),
            baseline: None,
            trigger: None,
        };

        // Phase 1: setup
        state.phases.begin(RunPhase::Setup);
        logging::log_startup(
            Component::Orchestrator,
            &format!("failover run {} against {}", self.run_id.short(), self.target),
        );
        let metrics = Arc::new(MetricsStore::new(&self.config.availability, RunClock::start()));
        let driver = LoadDriver::new(
            Arc::clone(&self.prober),
            Arc::clone(&metrics),
            self.config.load.clone(),
        );
        driver
            .prepare()
            .await
            .map_err(|e| OrchestratorError::setup(e.to_string()))?;
        let identity_before = self.capture_identity("before the run", &mut state.warnings).await;

        let handle = driver.start(&self.cancel, None);
        let (progress_token, progress) = self.spawn_progress(Arc::clone(&metrics));
        state.phases.complete(RunPhase::Setup);

        // Phases 2 to 4, each skipped once the run is cancelled
        self.baseline_phase(&metrics, &mut state).await;
        if state.baseline.is_some() {
            self.trigger_phase(&metrics, &mut state).await;
        }
        if state.phases.is_complete(RunPhase::TriggerWait) {
            self.monitoring_phase(&metrics, &mut state).await;
        }
        if self.cancel.is_cancelled() {
            logging::log_shutdown(Component::Orchestrator, "run cancelled, reconciling collected data");
            metrics.close_episode(RecoveryCompletion::Cancelled);
        }

        progress_token.cancel();
        if let Err(e) = progress.await {
            logging::log_error(Component::Orchestrator, "Progress monitor", &e);
        }
        match handle.stop().await {
            Ok(reports) => {
                let attempts: u64 = reports.iter().map(|r| r.attempts).sum();
                harness_info!(Component::Orchestrator, attempts, "🛑 Load stopped");
            }
            Err(e) => state.warnings.push(format!("Load workers did not stop cleanly: {e}")),
        }
        let frozen = metrics.freeze();

        // Phase 5: reconciliation
        state.phases.begin(RunPhase::Reconciliation);
        let rpo = if self.config.load.probe_mode.writes_rows() {
            self.reconciler
                .reconcile(frozen.metrics.success_count, &self.store, &self.run_id)
                .await
        } else {
            RpoMeasurement::NotApplicable
        };
        let identity_after = self.capture_identity("after the run", &mut state.warnings).await;
        state.phases.complete(RunPhase::Reconciliation);

        // Phase 6: report
        state.phases.begin(RunPhase::Report);
        let record = RunRecord {
            run_id: self.run_id.clone(),
            target: self.target.clone(),
            probe_mode: self.config.load.probe_mode,
            config: self.config.clone(),
            started_at: frozen.started_at,
            ended_at: frozen.ended_at,
            baseline: state.baseline,
            metrics: frozen.metrics,
            attempts: frozen.attempts,
            rpo,
            identity_before,
            identity_after,
            trigger: state.trigger,
            completed_phases: state.phases.completed().to_vec(),
            cancelled: self.cancel.is_cancelled(),
            warnings: state.warnings,
        };
        let summary = ReportGenerator::summarize(&record, &self.config.thresholds);
        let artifacts = self.write_artifacts(&record, &summary).await?;

        logging::log_success(
            Component::Reporter,
            &format!("Verdict {} for run {}", summary.verdict.overall, self.run_id.short()),
        );
        Ok(RunOutcome { summary, artifacts })
    }

    async fn baseline_phase(&self, metrics: &MetricsStore, state: &mut RunState) {
        state.phases.begin(RunPhase::Baseline);
        let duration = self.config.phases.baseline_duration;
        harness_info!(
            Component::Orchestrator,
            "📏 Baseline phase: {}s of steady load",
            duration.as_secs_f64()
        );

        let started = metrics.clock().elapsed();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            _ = time::sleep(duration) => {}
        }
        let elapsed = metrics.clock().elapsed().saturating_sub(started);

        let app_before = metrics.success_count();
        let failures = metrics.failure_count();
        let db_count = if self.config.load.probe_mode.writes_rows() {
            match self.reconciler.count_with_retry(&self.store, &self.run_id).await {
                Ok(count) => Some(count),
                Err(failure) => {
                    state.warnings.push(format!(
                        "Baseline row count unavailable after {} attempts: {}",
                        failure.attempts, failure.last_error
                    ));
                    None
                }
            }
        } else {
            None
        };
        let app_after = metrics.success_count();

        let snapshot = BaselineSnapshot::evaluate(
            app_before,
            app_after,
            db_count,
            elapsed,
            failures,
            self.config.load.worker_count as u64,
        );
        metrics.set_baseline_tps(snapshot.baseline_tps);

        if snapshot.consistent == Some(false) {
            harness_warn!(
                Component::Orchestrator,
                app_count = app_before,
                db_count = ?db_count,
                "⚠️  Baseline counts disagree before any failover"
            );
        }
        harness_info!(
            Component::Orchestrator,
            app_count = app_before,
            db_count = ?db_count,
            failures,
            "✅ Baseline complete: {:.1} TPS",
            snapshot.baseline_tps
        );

        state.baseline = Some(snapshot);
        state.phases.complete(RunPhase::Baseline);
    }

    async fn trigger_phase(&self, metrics: &MetricsStore, state: &mut RunState) {
        state.phases.begin(RunPhase::TriggerWait);
        harness_info!(
            Component::Orchestrator,
            "🟢 Environment stable. {}",
            self.gate.prompt()
        );

        let started = Instant::now();
        let mut states = metrics.subscribe();
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => TriggerOutcome::Cancelled,
            _ = states.wait_for(|s| !s.is_stable()) => TriggerOutcome::FailureObserved {
                waited_secs: started.elapsed().as_secs_f64(),
            },
            result = self.gate.wait_for_trigger(self.config.phases.max_trigger_wait) => match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    state.warnings.push(format!("Trigger gate failed: {e}; monitoring without a signal"));
                    TriggerOutcome::NotRequired
                }
            },
        };

        match &outcome {
            TriggerOutcome::Cancelled => {}
            TriggerOutcome::TimedOut { waited_secs } => harness_warn!(
                Component::Orchestrator,
                "⏱️  No trigger signal after {:.0}s, monitoring anyway",
                waited_secs
            ),
            TriggerOutcome::InputClosed => harness_warn!(
                Component::Orchestrator,
                "Standard input closed, monitoring without a signal"
            ),
            other => harness_info!(Component::Orchestrator, outcome = ?other, "▶️  Trigger received"),
        }

        let cancelled = outcome == TriggerOutcome::Cancelled;
        state.trigger = Some(outcome);
        if !cancelled {
            state.phases.complete(RunPhase::TriggerWait);
        }
    }

    async fn monitoring_phase(&self, metrics: &MetricsStore, state: &mut RunState) {
        state.phases.begin(RunPhase::Monitoring);
        let budget = self.config.phases.max_monitoring;
        harness_info!(
            Component::Orchestrator,
            budget_secs = ?budget.map(|b| b.as_secs_f64()),
            "👀 Monitoring for failover and recovery"
        );

        let mut states = metrics.subscribe();
        let expiry = async {
            match budget {
                Some(budget) => time::sleep(budget).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            _ = states.wait_for(|s| *s == AvailabilityState::Recovered) => {}
            _ = expiry => {
                let current = metrics.state();
                harness_warn!(
                    Component::Orchestrator,
                    state = %current,
                    "⏱️  Monitoring budget expired"
                );
                metrics.close_episode(RecoveryCompletion::BudgetExpired);
            }
        }
        state.phases.complete(RunPhase::Monitoring);
    }

    async fn capture_identity(&self, label: &str, warnings: &mut Vec<String>) -> Option<ServerIdentity> {
        match self.store.server_identity().await {
            Ok(identity) => {
                harness_info!(
                    Component::Orchestrator,
                    server = %identity.endpoint(),
                    database = %identity.database,
                    "🔎 Server {}",
                    label
                );
                Some(identity)
            }
            Err(e) => {
                warnings.push(format!("Server identity unavailable {label}: {e}"));
                None
            }
        }
    }

    fn spawn_progress(&self, metrics: Arc<MetricsStore>) -> (CancellationToken, JoinHandle<()>) {
        let token = self.cancel.child_token();
        let period = self.config.phases.progress_interval;
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => log_progress(&metrics),
                }
            }
        });
        (token, handle)
    }

    async fn write_artifacts(&self, record: &RunRecord, summary: &RunSummary) -> OrchestratorResult<Vec<PathBuf>> {
        let run_id = self.run_id.to_string();
        let csv = ReportGenerator::timeseries_csv(&record.attempts);
        let json = ReportGenerator::to_json(summary)?;

        let timeseries = self
            .file_system
            .write_artifact(&ReportGenerator::timeseries_file_name(&run_id), &csv)
            .await?;
        let summary_path = self
            .file_system
            .write_artifact(&ReportGenerator::summary_file_name(&run_id), &json)
            .await?;
        Ok(vec![timeseries, summary_path])
    }
}

fn log_progress(metrics: &MetricsStore) {
    let snapshot = metrics.snapshot();
    let recent = metrics
        .recent_success_rate(RECENT_WINDOW)
        .map(|rate| format!("{:.1}%", rate * 100.0))
        .unwrap_or_else(|| "-".to_string());
    logging::log_progress(
        Component::Orchestrator,
        "Progress",
        &format!(
            "{} attempts, {} ok, {} failed, last {} {}, {:.1} TPS, {}",
            snapshot.total_attempts(),
            snapshot.success_count,
            snapshot.failure_count,
            RECENT_WINDOW,
            recent,
            metrics.trailing_tps(),
            snapshot.state
        ),
    );
}
