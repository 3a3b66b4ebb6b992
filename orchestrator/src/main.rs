//! `failover-harness`: measure RTO and RPO across one database failover
//!
//! Exit codes: 0 when every verdict component passes, 1 on a failed verdict,
//! 2 when the run could not be set up or its artifacts could not be written.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use loadgen::{PgConnector, PostgresProber};
use orchestrator::{
    services::{FileTrigger, ImmediateTrigger, PostgresStore, RealFileSystem, StdinTrigger},
    ConsoleSummary, Orchestrator, OrchestratorError, OrchestratorResult, RunOutcome, TriggerGate,
};
use shared::{
    harness_info, logging, AvailabilityConfig, Component, DatabaseTarget, HarnessConfig,
    LoadConfig, PhaseConfig, ProbeMode, ReconcileConfig, RunId, Thresholds,
};

const EXIT_FAIL: u8 = 1;
const EXIT_ERROR: u8 = 2;

/// How the operator signals that the failover has been triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TriggerMode {
    /// Wait for Enter on standard input
    Stdin,
    /// Wait for --trigger-file to exist
    File,
    /// Start monitoring right after the baseline
    None,
}

/// Failover observability harness for a replicated PostgreSQL database
#[derive(Parser, Debug)]
#[command(name = "failover-harness")]
#[command(about = "Generates write load across a database failover and reports RTO, RPO and an SLA verdict")]
pub struct Args {
    /// PostgreSQL URL; falls back to DATABASE_URL or POSTGRES_* variables (and .env)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Table the insert probe writes to
    #[arg(long, default_value = DatabaseTarget::DEFAULT_TABLE)]
    pub table: String,

    /// Aggregate probe attempts per second
    #[arg(long, default_value_t = 50.0)]
    pub rate: f64,

    /// Concurrent probe workers
    #[arg(long, default_value_t = 10)]
    pub workers: u32,

    /// insert (write a tagged row) or connectivity (SELECT 1)
    #[arg(long, default_value = "insert")]
    pub probe_mode: ProbeMode,

    /// Per-attempt timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub probe_timeout_ms: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub baseline_secs: u64,

    #[arg(long, value_enum, default_value_t = TriggerMode::Stdin)]
    pub trigger: TriggerMode,

    /// File whose appearance signals the trigger (with --trigger file)
    #[arg(long)]
    pub trigger_file: Option<PathBuf>,

    #[arg(long, default_value_t = 600)]
    pub max_trigger_wait_secs: u64,

    /// Monitoring budget after the trigger; 0 means unbounded
    #[arg(long, default_value_t = 300)]
    pub max_monitoring_secs: u64,

    /// Consecutive successes before recovery can complete
    #[arg(long, default_value_t = 10)]
    pub stability_threshold: u32,

    /// Fraction of baseline TPS that counts as recovered
    #[arg(long, default_value_t = 0.8)]
    pub recovery_threshold: f64,

    #[arg(long, default_value_t = 10)]
    pub throughput_window_secs: u64,

    #[arg(long, default_value_t = 120.0)]
    pub rto_threshold_secs: f64,

    /// Maximum lost transactions
    #[arg(long, default_value_t = 0)]
    pub rpo_threshold: u64,

    #[arg(long, default_value_t = 5)]
    pub reconcile_attempts: u32,

    #[arg(long, default_value_t = 1_000)]
    pub reconcile_backoff_ms: u64,

    #[arg(long, default_value_t = 15_000)]
    pub reconcile_max_backoff_ms: u64,

    #[arg(long, default_value_t = 5)]
    pub progress_interval_secs: u64,

    /// Directory for timeseries-<run>.csv and summary-<run>.json
    #[arg(long, default_value = "./output")]
    pub output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn harness_config(&self) -> OrchestratorResult<HarnessConfig> {
        let config = HarnessConfig {
            load: LoadConfig {
                target_rate: self.rate,
                worker_count: self.workers,
                probe_timeout: Duration::from_millis(self.probe_timeout_ms),
                probe_mode: self.probe_mode,
            },
            availability: AvailabilityConfig {
                stability_threshold: self.stability_threshold,
                recovery_threshold: self.recovery_threshold,
                throughput_window: Duration::from_secs(self.throughput_window_secs),
            },
            thresholds: Thresholds {
                rto_threshold_secs: self.rto_threshold_secs,
                rpo_threshold: self.rpo_threshold,
            },
            phases: PhaseConfig {
                baseline_duration: Duration::from_secs(self.baseline_secs),
                max_trigger_wait: Duration::from_secs(self.max_trigger_wait_secs),
                max_monitoring: (self.max_monitoring_secs > 0)
                    .then(|| Duration::from_secs(self.max_monitoring_secs)),
                progress_interval: Duration::from_secs(self.progress_interval_secs),
            },
            reconcile: ReconcileConfig {
                max_attempts: self.reconcile_attempts,
                base_backoff: Duration::from_millis(self.reconcile_backoff_ms),
                max_backoff: Duration::from_millis(self.reconcile_max_backoff_ms),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn database_target(&self) -> OrchestratorResult<DatabaseTarget> {
        let target = match &self.database_url {
            Some(url) => DatabaseTarget::from_url(url, &self.table)?,
            None => DatabaseTarget::from_env(&self.table)?,
        };
        Ok(target.with_connect_timeout(Duration::from_secs(self.connect_timeout_secs)))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_tracing_with_level(Some(&args.log_level));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            logging::log_error(Component::Orchestrator, "Runtime startup", &e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let code = runtime.block_on(async {
        match run(args).await {
            Ok(outcome) => {
                println!("{}", ConsoleSummary(&outcome.summary));
                for path in &outcome.artifacts {
                    harness_info!(Component::Reporter, "📄 {}", path.display());
                }
                if outcome.summary.verdict.passed() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(EXIT_FAIL)
                }
            }
            Err(e) => {
                logging::log_error(Component::Orchestrator, "Run aborted", &e);
                ExitCode::from(EXIT_ERROR)
            }
        }
    });

    // A stdin read abandoned by a timed-out trigger gate never completes
    runtime.shutdown_background();
    code
}

async fn run(args: Args) -> OrchestratorResult<RunOutcome> {
    let config = args.harness_config()?;
    let target = args.database_target()?;
    let connector = PgConnector::from_target(&target)?;
    let run_id = RunId::new();

    let prober = Arc::new(PostgresProber::new(
        connector.clone(),
        &target,
        &run_id,
        config.load.probe_mode,
        config.load.worker_count,
    ));
    let store = PostgresStore::new(
        connector,
        &target.table,
        target.connect_timeout.max(config.load.probe_timeout),
    )?;
    let file_system = RealFileSystem::with_base_dir(&args.output);
    let description = target.describe();

    match args.trigger {
        TriggerMode::Stdin => {
            execute(run_id, description, config, prober, store, StdinTrigger, file_system).await
        }
        TriggerMode::File => {
            let path = args
                .trigger_file
                .ok_or_else(|| OrchestratorError::config("--trigger file requires --trigger-file"))?;
            let gate = FileTrigger::new(path);
            execute(run_id, description, config, prober, store, gate, file_system).await
        }
        TriggerMode::None => {
            execute(run_id, description, config, prober, store, ImmediateTrigger, file_system).await
        }
    }
}

async fn execute<G>(
    run_id: RunId,
    target: String,
    config: HarnessConfig,
    prober: Arc<PostgresProber>,
    store: PostgresStore,
    gate: G,
    file_system: RealFileSystem,
) -> OrchestratorResult<RunOutcome>
where
    G: TriggerGate,
{
    let orchestrator = Orchestrator::new(run_id, target, config, prober, store, gate, file_system);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(Component::Orchestrator, "Received Ctrl+C signal");
                cancel.cancel();
            }
            Err(err) => logging::log_error(Component::Orchestrator, "Signal handling", &err),
        }
    });

    orchestrator.run().await
}
