//! Real service implementations for the orchestrator

pub mod file_system;
pub mod postgres_store;
pub mod trigger_gate;

#[cfg(test)]
pub mod tests;

pub use file_system::RealFileSystem;
pub use postgres_store::PostgresStore;
pub use trigger_gate::{FileTrigger, ImmediateTrigger, StdinTrigger};
