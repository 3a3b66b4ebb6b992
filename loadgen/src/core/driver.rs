//! Load driver: fixed-rate probe workers feeding the metrics store

use shared::{harness_debug, harness_info, Component, FailureKind, LoadConfig, ProbeOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::metrics::MetricsStore;
use crate::error::LoadgenResult;
use crate::traits::Prober;

/// Attempts issued by one worker before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: u32,
    pub attempts: u64,
}

/// Runs `worker_count` probe loops against a shared [`MetricsStore`]
pub struct LoadDriver<P>
where
    P: Prober + 'static,
{
    prober: Arc<P>,
    store: Arc<MetricsStore>,
    config: LoadConfig,
}

impl<P> LoadDriver<P>
where
    P: Prober + 'static,
{
    pub fn new(prober: Arc<P>, store: Arc<MetricsStore>, config: LoadConfig) -> Self {
        Self {
            prober,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// One-time setup; an error here aborts the run before any load is sent
    pub async fn prepare(&self) -> LoadgenResult<()> {
        self.prober.prepare().await
    }

    /// Spawn the workers. They stop when `cancel` fires, when `duration`
    /// elapses, or when the returned handle is stopped.
    pub fn start(&self, cancel: &CancellationToken, duration: Option<Duration>) -> DriverHandle {
        let token = cancel.child_token();
        let period = self.config.worker_period();
        let workers = self.config.worker_count;

        harness_info!(
            Component::LoadDriver,
            workers,
            period_ms = period.as_millis() as u64,
            mode = %self.prober.mode(),
            "🚀 Starting load: {:.1} attempts/s across {} workers",
            self.config.target_rate,
            workers
        );

        if let Some(limit) = duration {
            let deadline = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = time::sleep(limit) => deadline.cancel(),
                    _ = deadline.cancelled() => {}
                }
            });
        }

        let now = Instant::now();
        let handles = (0..workers)
            .map(|worker| {
                // Spread the first ticks evenly across one period
                let offset = period.mul_f64(worker as f64 / workers as f64);
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&self.prober),
                    Arc::clone(&self.store),
                    now + offset,
                    period,
                    self.config.probe_timeout,
                    token.clone(),
                ))
            })
            .collect();

        DriverHandle { token, handles }
    }
}

/// Handle to running workers
pub struct DriverHandle {
    token: CancellationToken,
    handles: Vec<JoinHandle<WorkerReport>>,
}

impl DriverHandle {
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop issuing attempts and wait until every in-flight attempt has been
    /// recorded. Takes at most one probe timeout.
    pub async fn stop(self) -> LoadgenResult<Vec<WorkerReport>> {
        self.token.cancel();
        self.join().await
    }

    /// Wait for the workers to finish on their own
    pub async fn join(self) -> LoadgenResult<Vec<WorkerReport>> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            reports.push(handle.await?);
        }
        Ok(reports)
    }
}

async fn run_worker<P>(
    worker: u32,
    prober: Arc<P>,
    store: Arc<MetricsStore>,
    first_tick: Instant,
    period: Duration,
    timeout: Duration,
    token: CancellationToken,
) -> WorkerReport
where
    P: Prober + 'static,
{
    let mut ticker = time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut attempts = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Cancellation only stops new ticks. A write already sent may commit,
        // so it runs to completion (bounded by the probe timeout) and is recorded.
        let (outcome, latency) = timed_attempt(prober.as_ref(), worker, timeout).await;

        if let ProbeOutcome::Failure { kind, detail } = &outcome {
            harness_debug!(
                Component::Worker(worker),
                kind = %kind,
                latency_ms = latency.as_millis() as u64,
                "Probe failed: {}",
                detail
            );
        }

        if store.record(worker, latency, outcome).is_none() {
            break;
        }
        attempts += 1;
    }

    WorkerReport { worker, attempts }
}

/// Run one probe bounded by `timeout`, measuring its latency
pub async fn timed_attempt<P>(prober: &P, worker: u32, timeout: Duration) -> (ProbeOutcome, Duration)
where
    P: Prober + ?Sized,
{
    let started = Instant::now();
    let outcome = match time::timeout(timeout, prober.attempt(worker)).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::failure(
            FailureKind::Timeout,
            format!("no response within {}ms", timeout.as_millis()),
        ),
    };
    (outcome, started.elapsed())
}
