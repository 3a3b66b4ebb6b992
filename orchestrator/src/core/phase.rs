//! Run phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phases in the order a run moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Setup,
    Baseline,
    TriggerWait,
    Monitoring,
    Reconciliation,
    Report,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Setup => "setup",
            RunPhase::Baseline => "baseline",
            RunPhase::TriggerWait => "trigger_wait",
            RunPhase::Monitoring => "monitoring",
            RunPhase::Reconciliation => "reconciliation",
            RunPhase::Report => "report",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records which phases ran to completion
#[derive(Debug, Clone, Default)]
pub struct PhaseLog {
    current: Option<RunPhase>,
    completed: Vec<RunPhase>,
}

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, phase: RunPhase) {
        self.current = Some(phase);
    }

    pub fn complete(&mut self, phase: RunPhase) {
        if !self.completed.contains(&phase) {
            self.completed.push(phase);
        }
        if self.current == Some(phase) {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<RunPhase> {
        self.current
    }

    pub fn completed(&self) -> &[RunPhase] {
        &self.completed
    }

    pub fn is_complete(&self, phase: RunPhase) -> bool {
        self.completed.contains(&phase)
    }
}

/// Measurement phases that did not finish, in run order
pub fn incomplete_phases(completed: &[RunPhase]) -> Vec<RunPhase> {
    [RunPhase::Baseline, RunPhase::TriggerWait, RunPhase::Monitoring]
        .into_iter()
        .filter(|phase| !completed.contains(phase))
        .collect()
}
