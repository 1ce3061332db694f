//! Self-throttling in front of the backend's call quota.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::batch::stats::BatchStats;
use crate::common::Clock;

#[derive(Debug, Default)]
struct ThrottleState {
    last_call: Option<Instant>,
    /// Start times of calls inside the current window, oldest first.
    recent: VecDeque<Instant>,
}

/// Spaces physical calls by a minimum delay and caps calls per window.
///
/// Waiting here is the RATE_LIMIT path: it is counted, never an error.
#[derive(Debug)]
pub struct Throttle {
    min_delay: Duration,
    calls_per_window: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<ThrottleState>,
    stats: Arc<BatchStats>,
}

impl Throttle {
    pub fn new(
        min_delay: Duration,
        calls_per_window: usize,
        window: Duration,
        clock: Arc<dyn Clock>,
        stats: Arc<BatchStats>,
    ) -> Self {
        Self {
            min_delay,
            calls_per_window: calls_per_window.max(1),
            window,
            clock,
            state: Mutex::new(ThrottleState::default()),
            stats,
        }
    }

    /// Block until one more physical call is allowed, then record it.
    pub fn admit(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = self.clock.now();
                let wait = self.required_wait(&mut state, now);
                if wait.is_zero() {
                    state.last_call = Some(now);
                    state.recent.push_back(now);
                    return;
                }
                wait
            };

            BatchStats::bump(&self.stats.throttle_waits, 1);
            debug!(wait_ms = wait.as_millis() as u64, "throttling backend call");
            self.clock.sleep(wait);
        }
    }

    fn required_wait(&self, state: &mut ThrottleState, now: Instant) -> Duration {
        while let Some(&oldest) = state.recent.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                state.recent.pop_front();
            } else {
                break;
            }
        }

        let spacing = state
            .last_call
            .map(|last| self.min_delay.saturating_sub(now.saturating_duration_since(last)))
            .unwrap_or(Duration::ZERO);

        let quota = if state.recent.len() >= self.calls_per_window {
            state
                .recent
                .front()
                .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                .unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        };

        spacing.max(quota)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ManualClock;
    use std::sync::atomic::Ordering;

    fn throttle(
        delay_ms: u64,
        calls: usize,
        window: Duration,
    ) -> (Arc<ManualClock>, Arc<BatchStats>, Throttle) {
        let clock = Arc::new(ManualClock::new());
        let stats = Arc::new(BatchStats::new());
        let throttle = Throttle::new(
            Duration::from_millis(delay_ms),
            calls,
            window,
            clock.clone(),
            stats.clone(),
        );
        (clock, stats, throttle)
    }

    #[test]
    fn test_first_call_is_free_then_spaced() {
        let (clock, stats, throttle) = throttle(100, 60, Duration::from_secs(60));

        throttle.admit();
        assert_eq!(clock.elapsed(), Duration::ZERO);

        throttle.admit();
        throttle.admit();
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
        assert_eq!(stats.throttle_waits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_no_wait_when_spacing_already_elapsed() {
        let (clock, stats, throttle) = throttle(100, 60, Duration::from_secs(60));
        throttle.admit();
        clock.advance(Duration::from_millis(250));
        throttle.admit();
        assert_eq!(stats.throttle_waits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_window_ceiling() {
        let (clock, _, throttle) = throttle(0, 3, Duration::from_secs(10));
        for _ in 0..3 {
            throttle.admit();
        }
        assert_eq!(clock.elapsed(), Duration::ZERO);

        // Fourth call waits for the oldest to leave the window
        throttle.admit();
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
    }
}
