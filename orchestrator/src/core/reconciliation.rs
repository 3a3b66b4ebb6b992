//! RPO reconciliation
//!
//! Compares the application's success count with the rows the database
//! actually holds for the run. A count query failure is retried with
//! exponential backoff; if every attempt fails the RPO is unknown, never guessed.

use rand::Rng;
use shared::{harness_info, harness_warn, Component, ReconcileConfig, RunId};
use std::time::Duration;

use crate::traits::AuthoritativeStore;
use crate::types::RpoMeasurement;

/// The count query failed on every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountFailure {
    pub attempts: u32,
    pub last_error: String,
}

pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub async fn reconcile<S>(&self, app_count: u64, store: &S, run_id: &RunId) -> RpoMeasurement
    where
        S: AuthoritativeStore + ?Sized,
    {
        match self.count_with_retry(store, run_id).await {
            Ok(db_count) => {
                let measurement = compare_counts(app_count, db_count);
                match &measurement {
                    RpoMeasurement::Anomaly { surplus, .. } => harness_warn!(
                        Component::Reconciler,
                        app_count,
                        db_count,
                        "⚠️  Database holds {} more rows than the application recorded",
                        surplus
                    ),
                    _ => harness_info!(
                        Component::Reconciler,
                        app_count,
                        db_count,
                        "🧮 Reconciled: {} transactions lost",
                        app_count - db_count
                    ),
                }
                measurement
            }
            Err(failure) => RpoMeasurement::Unknown {
                app_count,
                attempts: failure.attempts,
                last_error: failure.last_error,
            },
        }
    }

    /// Count the run's rows, retrying failed queries with backoff
    pub async fn count_with_retry<S>(&self, store: &S, run_id: &RunId) -> Result<u64, CountFailure>
    where
        S: AuthoritativeStore + ?Sized,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match store.count_rows(run_id).await {
                Ok(count) => return Ok(count),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = self.delay_for(attempt);
                    harness_warn!(
                        Component::Reconciler,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "🔄 Count query failed, retrying: {}",
                        last_error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        harness_warn!(
            Component::Reconciler,
            attempts = max_attempts,
            "❌ Count query failed on every attempt: {}",
            last_error
        );
        Err(CountFailure {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Backoff for retry `attempt` plus up to 10% jitter, never above the cap
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_for(attempt);
        let jitter_ms = (base.as_millis() as u64) / 10;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        (base + jitter).min(self.config.max_backoff)
    }
}

/// `app - db` as lost transactions; a database surplus is an anomaly, never negative loss
pub fn compare_counts(app_count: u64, db_count: u64) -> RpoMeasurement {
    if db_count > app_count {
        RpoMeasurement::Anomaly {
            app_count,
            db_count,
            surplus: db_count - app_count,
        }
    } else {
        RpoMeasurement::Measured {
            app_count,
            db_count,
            lost: app_count - db_count,
        }
    }
}
