//! Shared types for the failover harness
//!
//! Holds the data model that crosses crate boundaries: probe attempts, the
//! availability state snapshot, run configuration and the database target.
//! Report and verdict types live with the orchestrator that produces them.

pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
