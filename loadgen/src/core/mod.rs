//! Load generator core logic
//!
//! `availability` and `throughput` are pure and clock-free; `metrics` wraps them
//! in the single critical section every worker goes through; `driver` owns the
//! worker tasks.

pub mod availability;
pub mod clock;
pub mod driver;
pub mod metrics;
pub mod throughput;

pub use availability::AvailabilityMachine;
pub use clock::RunClock;
pub use driver::{timed_attempt, DriverHandle, LoadDriver, WorkerReport};
pub use metrics::{FrozenRun, MetricsStore, Recorded};
pub use throughput::ThroughputWindow;
