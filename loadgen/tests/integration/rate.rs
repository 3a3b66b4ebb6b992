//! Rate and ticker behaviour

use crate::fixtures::*;
use assert_matches::assert_matches;
use loadgen::{LoadDriver, MetricsStore, RunClock};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_aggregate_rate_matches_target() {
    let prober = Arc::new(ScriptedProber::healthy());
    let store = Arc::new(MetricsStore::new(&availability_config(10), RunClock::start()));
    let driver = LoadDriver::new(prober.clone(), store.clone(), load_config(50.0, 10));

    let reports = driver
        .start(&CancellationToken::new(), Some(Duration::from_secs(10)))
        .join()
        .await
        .expect("workers join");

    // 10 workers at one attempt per 200ms for 10s
    let total = store.success_count();
    assert!((500..=510).contains(&total), "total attempts {total}");
    assert_eq!(reports.len(), 10);
    assert_eq!(reports.iter().map(|r| r.attempts).sum::<u64>(), total);
    for report in &reports {
        assert!((50..=51).contains(&report.attempts), "{report:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_each_tick_issues_exactly_one_attempt() {
    let prober = Arc::new(ScriptedProber::outage(Duration::ZERO, Duration::from_secs(60)));
    let store = Arc::new(MetricsStore::new(&availability_config(10), RunClock::start()));
    let driver = LoadDriver::new(prober.clone(), store.clone(), load_config(4.0, 2));

    driver
        .start(&CancellationToken::new(), Some(Duration::from_millis(2_900)))
        .join()
        .await
        .expect("workers join");

    // Ticks at 0, 0.5 .. 2.5s and 0.25 .. 2.75s; failures are never retried inside a tick
    assert_eq!(prober.calls(), store.failure_count());
    assert_eq!(store.failure_count(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_skips_missed_ticks() {
    // Each attempt takes 450ms against a 100ms period with a 1s timeout
    let prober = Arc::new(ScriptedProber::healthy().with_delay(Duration::from_millis(450)));
    let store = Arc::new(MetricsStore::new(&availability_config(10), RunClock::start()));
    let driver = LoadDriver::new(prober.clone(), store.clone(), load_config(10.0, 1));

    let reports = driver
        .start(&CancellationToken::new(), Some(Duration::from_millis(2_000)))
        .join()
        .await
        .expect("workers join");

    // No burst after a slow attempt: at most one attempt per 450ms
    assert_matches!(reports.as_slice(), [report] if report.attempts <= 5);
    let attempts = store.attempts();
    for pair in attempts.windows(2) {
        assert!(pair[1].offset - pair[0].offset >= Duration::from_millis(450));
    }
}
