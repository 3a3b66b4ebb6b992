//! Outage detection through the full driver path

use crate::fixtures::*;
use loadgen::{LoadDriver, MetricsStore, RunClock};
use shared::{AvailabilityState, RecoveryCompletion};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_outage_window_yields_rto() {
    let prober = Arc::new(ScriptedProber::outage(
        Duration::from_secs(2),
        Duration::from_secs(4),
    ));
    let store = Arc::new(MetricsStore::new(&availability_config(3), RunClock::start()));
    let mut states = store.subscribe();
    let driver = LoadDriver::new(prober, store.clone(), load_config(10.0, 2));

    driver
        .start(&CancellationToken::new(), Some(Duration::from_secs(8)))
        .join()
        .await
        .expect("workers join");

    let metrics = store.snapshot();
    let rto = metrics.rto().expect("outage was observed");
    assert!(
        rto >= Duration::from_millis(1_900) && rto <= Duration::from_millis(2_100),
        "rto {rto:?}"
    );
    assert_eq!(metrics.state, AvailabilityState::Recovered);
    assert_eq!(
        metrics.recovery_completion,
        Some(RecoveryCompletion::ThroughputRestored)
    );
    assert_eq!(metrics.post_recovery_failures, 0);
    assert_eq!(*states.borrow_and_update(), AvailabilityState::Recovered);
}

#[tokio::test(start_paused = true)]
async fn test_throughput_gate_uses_baseline() {
    let prober = Arc::new(ScriptedProber::outage(
        Duration::from_secs(1),
        Duration::from_secs(2),
    ));
    let store = Arc::new(MetricsStore::new(&availability_config(3), RunClock::start()));
    store.set_baseline_tps(10.0);
    let driver = LoadDriver::new(prober, store.clone(), load_config(10.0, 2));

    driver
        .start(&CancellationToken::new(), Some(Duration::from_secs(6)))
        .join()
        .await
        .expect("workers join");

    let metrics = store.snapshot();
    let recovered = metrics.first_recovery.expect("recovered");
    let stable = metrics.stable_again.expect("throughput restored");
    // 8/s over the 2s window needs well over three successes after the outage
    assert!(stable.since(&recovered) >= Duration::from_secs(1), "{:?}", stable.since(&recovered));
}
