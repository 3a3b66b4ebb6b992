//! Trailing-window throughput

use std::collections::VecDeque;
use std::time::Duration;

/// Successful attempts over a trailing time window
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    window: Duration,
    /// Run offsets of successes inside the window, oldest first
    samples: VecDeque<Duration>,
}

impl ThroughputWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn record(&mut self, at: Duration) {
        self.samples.push_back(at);
        self.prune(at);
    }

    /// Successes per second over `(now - window, now]`
    pub fn tps(&mut self, now: Duration) -> f64 {
        self.prune(now);
        self.samples.len() as f64 / self.window.as_secs_f64()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn prune(&mut self, now: Duration) {
        let cutoff = now.saturating_sub(self.window);
        while let Some(front) = self.samples.front() {
            if *front <= cutoff && now >= self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
