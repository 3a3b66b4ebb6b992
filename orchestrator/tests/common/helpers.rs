//! Test helpers and builder patterns for orchestrator tests
//!
//! Integration tests run on paused tokio time, so a run with a ten second
//! baseline and a sixty second monitoring budget completes instantly.

use orchestrator::services::ImmediateTrigger;
use orchestrator::{Orchestrator, RunSummary, TriggerGate};
use shared::{
    AvailabilityConfig, HarnessConfig, LoadConfig, PhaseConfig, ProbeMode, ReconcileConfig,
    Thresholds,
};
use std::sync::Arc;
use std::time::Duration;

use super::fakes::{FakeDatabase, FakeProber, FakeStore, MemoryFileSystem};
use super::fixtures::TestFixtures;

pub type TestOrchestrator<G> = Orchestrator<FakeProber, FakeStore, G, MemoryFileSystem>;

/// Builder for orchestrators wired to a [`FakeDatabase`]
pub struct OrchestratorBuilder {
    config: HarnessConfig,
    database: FakeDatabase,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: TestHelpers::fast_config(),
            database: FakeDatabase::healthy(),
        }
    }

    pub fn with_database(mut self, database: FakeDatabase) -> Self {
        self.database = database;
        self
    }

    pub fn with_config(mut self, adjust: impl FnOnce(&mut HarnessConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    pub fn build(self) -> (TestOrchestrator<ImmediateTrigger>, Arc<FakeDatabase>, MemoryFileSystem) {
        self.build_with_gate(ImmediateTrigger)
    }

    pub fn build_with_gate<G: TriggerGate>(
        self,
        gate: G,
    ) -> (TestOrchestrator<G>, Arc<FakeDatabase>, MemoryFileSystem) {
        let config = self.config;
        let (db, prober, store) = self
            .database
            .with_mode(config.load.probe_mode)
            .into_parts();
        let files = MemoryFileSystem::new();
        let orchestrator = Orchestrator::new(
            TestFixtures::run_id(),
            "postgres://app@db.internal:5432/orders",
            config,
            prober,
            store,
            gate,
            files.clone(),
        );
        (orchestrator, db, files)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TestHelpers;

impl TestHelpers {
    /// 10 attempts/s from two workers, a ten second baseline and a one
    /// minute monitoring budget
    pub fn fast_config() -> HarnessConfig {
        HarnessConfig {
            load: LoadConfig {
                target_rate: 10.0,
                worker_count: 2,
                probe_timeout: Duration::from_secs(1),
                probe_mode: ProbeMode::Insert,
            },
            availability: AvailabilityConfig {
                stability_threshold: 3,
                recovery_threshold: 0.8,
                throughput_window: Duration::from_secs(2),
            },
            thresholds: Thresholds::default(),
            phases: PhaseConfig {
                baseline_duration: Duration::from_secs(10),
                max_trigger_wait: Duration::from_secs(60),
                max_monitoring: Some(Duration::from_secs(60)),
                progress_interval: Duration::from_secs(5),
            },
            reconcile: ReconcileConfig {
                max_attempts: 3,
                base_backoff: Duration::from_millis(100),
                max_backoff: Duration::from_secs(1),
            },
        }
    }

    pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    pub fn has_warning(summary: &RunSummary, needle: &str) -> bool {
        summary.warnings.iter().any(|w| w.contains(needle))
    }
}
