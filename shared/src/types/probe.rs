//! Probe attempt records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::duration_format;

/// Classification of a failed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// TCP connect refused or reset by the server
    ConnectionRefused,
    /// Per-attempt deadline exceeded
    Timeout,
    /// Authentication rejected or the wire protocol broke
    AuthOrProtocolError,
    /// Anything else, including server-side shutdown notices
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConnectionRefused => "connection_refused",
            FailureKind::Timeout => "timeout",
            FailureKind::AuthOrProtocolError => "auth_or_protocol_error",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one round trip to the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Success,
    Failure { kind: FailureKind, detail: String },
}

impl ProbeOutcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        ProbeOutcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ProbeOutcome::Success => None,
            ProbeOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// What a probe does on each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Insert one row tagged with the run marker
    Insert,
    /// Issue `SELECT 1`; no rows are written so RPO cannot be measured
    Connectivity,
}

impl ProbeMode {
    pub fn writes_rows(&self) -> bool {
        matches!(self, ProbeMode::Insert)
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::Insert => write!(f, "insert"),
            ProbeMode::Connectivity => write!(f, "connectivity"),
        }
    }
}

impl std::str::FromStr for ProbeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" | "write" => Ok(ProbeMode::Insert),
            "connectivity" | "select" | "read" => Ok(ProbeMode::Connectivity),
            _ => Err(format!("Unknown probe mode: {s} (expected insert or connectivity)")),
        }
    }
}

/// One recorded probe attempt. Never mutated after it is appended to the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeAttempt {
    /// Position in the run log, starting at 1
    pub seq: u64,
    pub worker: u32,
    pub timestamp: DateTime<Utc>,
    /// Monotonic offset from run start
    #[serde(rename = "offset_ms", with = "duration_format::millis")]
    pub offset: Duration,
    /// Round-trip latency; only meaningful on success
    #[serde(rename = "duration_ms", with = "duration_format::millis")]
    pub latency: Duration,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

impl ProbeAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Success => None,
            ProbeOutcome::Failure { detail, .. } => Some(detail),
        }
    }
}
