//! Load generation for the failover harness
//!
//! Runs a fleet of probe workers against the database under test and funnels
//! every outcome through a single mutex-guarded metrics store, where the
//! availability state machine stamps the failure and recovery boundaries.

pub mod core;
pub mod error;
pub mod services;
pub mod traits;

// Re-export main types
pub use crate::core::{
    timed_attempt, AvailabilityMachine, DriverHandle, FrozenRun, LoadDriver, MetricsStore, Recorded,
    RunClock, ThroughputWindow, WorkerReport,
};
pub use error::{LoadgenError, LoadgenResult};
pub use services::{PgConnector, PostgresProber};
pub use traits::{MockProber, Prober};
