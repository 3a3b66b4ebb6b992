//! Test fixtures for driving the load generator without a database

pub mod probers;

pub use configs::*;
pub use probers::*;
