//! Loadgen service implementations

pub mod postgres;

#[cfg(test)]
pub mod tests;

pub use postgres::*;
