//! Core types used throughout the harness

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod availability;
pub mod duration_format;
pub mod probe;

pub use availability::{AvailabilityState, RecoveryCompletion, RunMetrics, RunTimestamp, Transition};
pub use probe::{FailureKind, ProbeAttempt, ProbeMode, ProbeOutcome};

/// Marker written into every probe row so reconciliation only counts this run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// First eight hex digits, used in artifact file names
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component of the harness emitting a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// Phase driver (singleton)
    Orchestrator,
    /// Load driver as a whole: start, stop, pacing
    LoadDriver,
    /// Load driver worker with its slot number
    Worker(u32),
    /// Database connections and probe setup
    Prober,
    /// Availability state machine inside the metrics store
    Availability,
    /// Row-count reconciliation
    Reconciler,
    /// Summary and time-series output
    Reporter,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Orchestrator => write!(f, "orchestrator"),
            Component::LoadDriver => write!(f, "load_driver"),
            Component::Worker(id) => write!(f, "worker_{id}"),
            Component::Prober => write!(f, "prober"),
            Component::Availability => write!(f, "availability"),
            Component::Reconciler => write!(f, "reconciler"),
            Component::Reporter => write!(f, "reporter"),
        }
    }
}
