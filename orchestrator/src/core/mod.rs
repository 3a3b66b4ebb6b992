//! Core orchestrator logic: phases, reconciliation and reporting

pub mod phase;
pub mod reconciliation;
pub mod report;

pub use phase::{incomplete_phases, PhaseLog, RunPhase};
pub use reconciliation::{compare_counts, CountFailure, Reconciler};
pub use report::{ConsoleSummary, ReportGenerator, TIMESERIES_HEADER};
