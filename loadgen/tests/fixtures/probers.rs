//! Scripted probers

use async_trait::async_trait;
use loadgen::{LoadgenResult, Prober};
use shared::{FailureKind, ProbeMode, ProbeOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

type Script = dyn Fn(Duration) -> bool + Send + Sync;

/// Prober whose outcome is a function of time since it was created
pub struct ScriptedProber {
    origin: Instant,
    succeeds_at: Box<Script>,
    delay: Duration,
    calls: AtomicU64,
}

impl ScriptedProber {
    pub fn healthy() -> Self {
        Self::scripted(|_| true)
    }

    pub fn scripted<F>(succeeds_at: F) -> Self
    where
        F: Fn(Duration) -> bool + Send + Sync + 'static,
    {
        Self {
            origin: Instant::now(),
            succeeds_at: Box::new(succeeds_at),
            delay: Duration::ZERO,
            calls: AtomicU64::new(0),
        }
    }

    /// Fail for every attempt started inside `[from, until)`
    pub fn outage(from: Duration, until: Duration) -> Self {
        Self::scripted(move |at| at < from || at >= until)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn prepare(&self) -> LoadgenResult<()> {
        Ok(())
    }

    async fn attempt(&self, _worker: u32) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let started = self.origin.elapsed();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if (self.succeeds_at)(started) {
            ProbeOutcome::Success
        } else {
            ProbeOutcome::failure(FailureKind::ConnectionRefused, "connection refused")
        }
    }

    fn mode(&self) -> ProbeMode {
        ProbeMode::Insert
    }
}
