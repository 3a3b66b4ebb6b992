//! Operator gates between the baseline and monitoring phases

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::TriggerGate;
use crate::types::TriggerOutcome;

/// Waits for the operator to press Enter
pub struct StdinTrigger;

#[async_trait]
impl TriggerGate for StdinTrigger {
    async fn wait_for_trigger(&self, max_wait: Duration) -> OrchestratorResult<TriggerOutcome> {
        let started = Instant::now();
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());

        match tokio::time::timeout(max_wait, reader.read_line(&mut line)).await {
            Ok(Ok(0)) => Ok(TriggerOutcome::InputClosed),
            Ok(Ok(_)) => Ok(TriggerOutcome::Signalled {
                source: "stdin".to_string(),
                waited_secs: started.elapsed().as_secs_f64(),
            }),
            Ok(Err(e)) => Err(OrchestratorError::TriggerError {
                message: format!("reading stdin: {e}"),
            }),
            Err(_) => Ok(TriggerOutcome::TimedOut {
                waited_secs: started.elapsed().as_secs_f64(),
            }),
        }
    }

    fn prompt(&self) -> String {
        "Trigger the failover now, then press Enter".to_string()
    }
}

/// Waits for a file to appear, for automation that cannot type into stdin
pub struct FileTrigger {
    path: PathBuf,
    poll_interval: Duration,
}

impl FileTrigger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl TriggerGate for FileTrigger {
    async fn wait_for_trigger(&self, max_wait: Duration) -> OrchestratorResult<TriggerOutcome> {
        let started = Instant::now();
        let deadline = started + max_wait;

        loop {
            let exists = tokio::fs::try_exists(&self.path)
                .await
                .map_err(|e| OrchestratorError::file_system("check trigger file", &self.path, e))?;
            if exists {
                return Ok(TriggerOutcome::Signalled {
                    source: self.path.display().to_string(),
                    waited_secs: started.elapsed().as_secs_f64(),
                });
            }
            if Instant::now() >= deadline {
                return Ok(TriggerOutcome::TimedOut {
                    waited_secs: started.elapsed().as_secs_f64(),
                });
            }
            tokio::time::sleep_until(deadline.min(Instant::now() + self.poll_interval)).await;
        }
    }

    fn prompt(&self) -> String {
        format!(
            "Trigger the failover now, then create {}",
            self.path.display()
        )
    }
}

/// No gate: monitoring starts right after the baseline
pub struct ImmediateTrigger;

#[async_trait]
impl TriggerGate for ImmediateTrigger {
    async fn wait_for_trigger(&self, _max_wait: Duration) -> OrchestratorResult<TriggerOutcome> {
        Ok(TriggerOutcome::NotRequired)
    }

    fn prompt(&self) -> String {
        "Monitoring started; trigger the failover whenever ready".to_string()
    }
}
