//! Driver integration tests

pub mod cancellation;
pub mod failover;
pub mod rate;
