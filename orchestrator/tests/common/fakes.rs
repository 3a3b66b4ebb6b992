//! In-process stand-ins for the database, the trigger and the output directory

use async_trait::async_trait;
use loadgen::{LoadgenError, LoadgenResult, Prober};
use orchestrator::{
    AuthoritativeStore, FileSystem, OrchestratorError, OrchestratorResult, ServerIdentity,
    TriggerGate, TriggerOutcome,
};
use shared::{FailureKind, ProbeMode, ProbeOutcome, RunId};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const PRIMARY: &str = "10.0.0.1";
pub const STANDBY: &str = "10.0.0.2";

/// A database with a scripted outage. The standby is promoted when the
/// outage ends, so identity queries afterwards report a different address.
pub struct FakeDatabase {
    origin: Instant,
    mode: ProbeMode,
    latency: Duration,
    outage_start: Option<Duration>,
    outage_end: Option<Duration>,
    flaky_after_outage: bool,
    commits_before_reply: bool,
    prepare_fails: bool,
    extra_rows: u64,
    lose_acks: AtomicU64,
    count_failures: AtomicU32,
    persisted: AtomicU64,
    attempts: AtomicU64,
    count_calls: AtomicU32,
}

impl FakeDatabase {
    pub fn healthy() -> Self {
        Self {
            origin: Instant::now(),
            mode: ProbeMode::Insert,
            latency: Duration::ZERO,
            outage_start: None,
            outage_end: None,
            flaky_after_outage: false,
            commits_before_reply: false,
            prepare_fails: false,
            extra_rows: 0,
            lose_acks: AtomicU64::new(0),
            count_failures: AtomicU32::new(0),
            persisted: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            count_calls: AtomicU32::new(0),
        }
    }

    /// Unreachable from `from` until `until`, or for good if `until` is `None`
    pub fn with_outage(mut self, from: Duration, until: Option<Duration>) -> Self {
        self.outage_start = Some(from);
        self.outage_end = until;
        self
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Acknowledge the first `count` writes after the outage without persisting them
    pub fn losing_acks(self, count: u64) -> Self {
        self.lose_acks.store(count, Ordering::SeqCst);
        self
    }

    /// Rows tagged with the run that the application never wrote
    pub fn with_extra_rows(mut self, rows: u64) -> Self {
        self.extra_rows = rows;
        self
    }

    /// Fail the next `count` row-count queries
    pub fn failing_counts(self, count: u32) -> Self {
        self.count_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Every other attempt fails once the outage is over
    pub fn flaky_after_outage(mut self) -> Self {
        self.flaky_after_outage = true;
        self
    }

    /// Persist each write before the latency elapses, so the reply arrives
    /// after the row is already durable
    pub fn committing_before_reply(mut self) -> Self {
        self.commits_before_reply = true;
        self
    }

    pub fn failing_prepare(mut self) -> Self {
        self.prepare_fails = true;
        self
    }

    pub fn into_parts(self) -> (Arc<FakeDatabase>, Arc<FakeProber>, FakeStore) {
        let db = Arc::new(self);
        (
            Arc::clone(&db),
            Arc::new(FakeProber(Arc::clone(&db))),
            FakeStore(db),
        )
    }

    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> u32 {
        self.count_calls.load(Ordering::SeqCst)
    }

    fn in_outage(&self, at: Duration) -> bool {
        match self.outage_start {
            Some(start) => at >= start && self.outage_end.map_or(true, |end| at < end),
            None => false,
        }
    }

    fn after_outage(&self, at: Duration) -> bool {
        self.outage_end.is_some_and(|end| at >= end)
    }

    fn apply(&self, at: Duration, n: u64) -> ProbeOutcome {
        if self.in_outage(at) {
            return ProbeOutcome::failure(FailureKind::ConnectionRefused, "connection refused");
        }
        if self.flaky_after_outage && self.after_outage(at) && n % 2 == 1 {
            return ProbeOutcome::failure(
                FailureKind::Other,
                "cannot execute INSERT in a read-only transaction",
            );
        }

        if self.mode.writes_rows() {
            let dropped = self.after_outage(at)
                && self
                    .lose_acks
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            if !dropped {
                self.persisted.fetch_add(1, Ordering::SeqCst);
            }
        }
        ProbeOutcome::Success
    }
}

pub struct FakeProber(Arc<FakeDatabase>);

#[async_trait]
impl Prober for FakeProber {
    async fn prepare(&self) -> LoadgenResult<()> {
        if self.0.prepare_fails {
            Err(LoadgenError::setup("password authentication failed for user \"app\""))
        } else {
            Ok(())
        }
    }

    async fn attempt(&self, _worker: u32) -> ProbeOutcome {
        let db = &self.0;
        let at = db.origin.elapsed();
        let n = db.attempts.fetch_add(1, Ordering::SeqCst);
        if db.commits_before_reply {
            let outcome = db.apply(at, n);
            tokio::time::sleep(db.latency).await;
            return outcome;
        }
        if !db.latency.is_zero() {
            tokio::time::sleep(db.latency).await;
        }
        db.apply(at, n)
    }

    fn mode(&self) -> ProbeMode {
        self.0.mode
    }
}

pub struct FakeStore(Arc<FakeDatabase>);

#[async_trait]
impl AuthoritativeStore for FakeStore {
    async fn count_rows(&self, _run_id: &RunId) -> OrchestratorResult<u64> {
        let db = &self.0;
        db.count_calls.fetch_add(1, Ordering::SeqCst);
        if db.in_outage(db.origin.elapsed()) {
            return Err(OrchestratorError::database("connection refused"));
        }
        let scripted_failure = db
            .count_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(OrchestratorError::database("the database system is starting up"));
        }
        Ok(db.persisted() + db.extra_rows)
    }

    async fn server_identity(&self) -> OrchestratorResult<ServerIdentity> {
        let db = &self.0;
        let at = db.origin.elapsed();
        if db.in_outage(at) {
            return Err(OrchestratorError::database("connection refused"));
        }
        let address = if db.after_outage(at) { STANDBY } else { PRIMARY };
        Ok(ServerIdentity {
            address: Some(address.to_string()),
            port: Some(5432),
            database: "orders".to_string(),
            version: "PostgreSQL 16.4".to_string(),
        })
    }
}

/// Artifact sink that keeps files in memory
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.files.lock().expect("files lock").get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.files.lock().expect("files lock").keys().cloned().collect()
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn write_artifact(&self, name: &str, contents: &str) -> OrchestratorResult<PathBuf> {
        self.files
            .lock()
            .expect("files lock")
            .insert(name.to_string(), contents.to_string());
        Ok(PathBuf::from("memory").join(name))
    }
}

/// Gate that never opens on its own
pub struct PendingGate;

#[async_trait]
impl TriggerGate for PendingGate {
    async fn wait_for_trigger(&self, _max_wait: Duration) -> OrchestratorResult<TriggerOutcome> {
        std::future::pending().await
    }

    fn prompt(&self) -> String {
        "Waiting for the failover".to_string()
    }
}
