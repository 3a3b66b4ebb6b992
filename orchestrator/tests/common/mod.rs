//! Common test utilities and infrastructure
//!
//! Fakes for the database and artifact output, run record fixtures for the
//! report generator, and a builder for fully wired orchestrators.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
pub mod helpers;

#[allow(unused_imports)]
pub use fakes::{FakeDatabase, FakeProber, FakeStore, MemoryFileSystem, PendingGate, PRIMARY, STANDBY};
#[allow(unused_imports)]
pub use fixtures::TestFixtures;
#[allow(unused_imports)]
pub use helpers::{OrchestratorBuilder, TestHelpers};
