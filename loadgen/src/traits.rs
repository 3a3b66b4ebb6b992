//! Probe trait definition for dependency injection

use async_trait::async_trait;

use crate::error::LoadgenResult;
use shared::{ProbeMode, ProbeOutcome};

/// A single round trip against the database under test
///
/// Implementations must be cheap to call concurrently from every worker.
/// The driver applies the per-attempt deadline and measures latency, so
/// `attempt` only reports what the database said.
#[mockall::automock]
#[async_trait]
pub trait Prober: Send + Sync {
    /// Verify the target is reachable and create the probe table if needed.
    /// An error here is a setup failure and aborts the run.
    async fn prepare(&self) -> LoadgenResult<()>;

    /// Issue one probe on behalf of `worker`. Failures are outcomes, not errors.
    async fn attempt(&self, worker: u32) -> ProbeOutcome;

    /// Whether successful attempts persist a row
    fn mode(&self) -> ProbeMode;
}
