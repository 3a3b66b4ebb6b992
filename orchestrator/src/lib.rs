//! Failover run orchestration
//!
//! Coordinates the load generator, the operator gate, RPO reconciliation and
//! report generation for one measured failover. Services are injected through
//! the traits in [`traits`] so every phase can be driven from tests.

pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use core::{ConsoleSummary, PhaseLog, Reconciler, ReportGenerator, RunPhase};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use traits::{AuthoritativeStore, FileSystem, TriggerGate};
pub use types::*;
