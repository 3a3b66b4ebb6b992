//! Cancellation and timeouts

use crate::fixtures::*;
use loadgen::{LoadDriver, MetricsStore, RunClock};
use shared::{FailureKind, LoadConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_stop_records_in_flight_attempts() {
    let prober = Arc::new(ScriptedProber::healthy().with_delay(Duration::from_secs(3)));
    let store = Arc::new(MetricsStore::new(&availability_config(10), RunClock::start()));
    let driver = LoadDriver::new(prober.clone(), store.clone(), load_config(1.0, 1));

    let handle = driver.start(&CancellationToken::new(), None);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let stopping = Instant::now();
    let reports = assert_ok!(handle.stop().await);

    // The write sent at 0s may already be committed, so stop waits for its reply
    assert_eq!(stopping.elapsed(), Duration::from_secs(2));
    assert_eq!(prober.calls(), 1);
    assert_eq!(reports[0].attempts, 1);
    let attempts = store.attempts();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].is_success());
    assert_eq!(attempts[0].latency, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_stop_issues_no_new_attempts() {
    let prober = Arc::new(ScriptedProber::healthy().with_delay(Duration::from_millis(400)));
    let store = Arc::new(MetricsStore::new(&availability_config(10), RunClock::start()));
    let driver = LoadDriver::new(prober.clone(), store.clone(), load_config(2.0, 1));

    let handle = driver.start(&CancellationToken::new(), None);
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_ok!(handle.stop().await);
    let calls = prober.calls();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(prober.calls(), calls);
    // Ticks at 0, 0.5 and 1.0s; the last one finishes after the stop
    assert_eq!(calls, 3);
    assert_eq!(store.success_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_parent_cancellation_stops_workers() {
    let prober = Arc::new(ScriptedProber::healthy());
    let store = Arc::new(MetricsStore::new(&availability_config(10), RunClock::start()));
    let driver = LoadDriver::new(prober, store.clone(), load_config(10.0, 2));
    let cancel = CancellationToken::new();

    let handle = driver.start(&cancel, None);
    tokio::time::sleep(Duration::from_millis(950)).await;
    cancel.cancel();
    assert!(handle.is_stopping());
    handle.join().await.expect("workers join");

    let recorded = store.success_count();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.success_count(), recorded);
    assert_eq!(recorded, 10);
}

#[tokio::test(start_paused = true)]
async fn test_hung_probe_times_out() {
    let prober = Arc::new(ScriptedProber::healthy().with_delay(Duration::from_secs(30)));
    let store = Arc::new(MetricsStore::new(&availability_config(10), RunClock::start()));
    let config = LoadConfig {
        probe_timeout: Duration::from_millis(500),
        ..load_config(1.0, 1)
    };
    let driver = LoadDriver::new(prober, store.clone(), config);

    driver
        .start(&CancellationToken::new(), Some(Duration::from_millis(2_200)))
        .join()
        .await
        .expect("workers join");

    // Ticks at 0s, 1s and 2s all time out; the deadline at 2.2s only stops
    // the ticker, so the last attempt still runs out its 500ms
    let attempts = store.attempts();
    assert_eq!(attempts.len(), 3);
    for attempt in &attempts {
        assert_eq!(attempt.outcome.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(attempt.latency, Duration::from_millis(500));
    }
    assert!(store.snapshot().failover_detected());
}
