//! Service traits with mockall annotations for dependency injection

use async_trait::async_trait;
use shared::RunId;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::OrchestratorResult;
use crate::types::{ServerIdentity, TriggerOutcome};

/// Direct, read-only access to the database, bypassing the probe write path
#[mockall::automock]
#[async_trait]
pub trait AuthoritativeStore: Send + Sync {
    /// Number of persisted probe rows tagged with `run_id`
    async fn count_rows(&self, run_id: &RunId) -> OrchestratorResult<u64>;

    /// Address and version of the server currently answering
    async fn server_identity(&self) -> OrchestratorResult<ServerIdentity>;
}

/// External signal that the failover may be (or has been) triggered
#[mockall::automock]
#[async_trait]
pub trait TriggerGate: Send + Sync {
    /// Block until the signal arrives or `max_wait` elapses
    async fn wait_for_trigger(&self, max_wait: Duration) -> OrchestratorResult<TriggerOutcome>;

    /// Operator-facing instruction for this gate
    fn prompt(&self) -> String;
}

/// Destination for run artifacts
#[mockall::automock]
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Write `contents` to `name` under the output directory, replacing any
    /// existing file, and return the full path
    async fn write_artifact(&self, name: &str, contents: &str) -> OrchestratorResult<PathBuf>;
}
