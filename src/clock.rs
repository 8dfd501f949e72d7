//! # Clock Module
//!
//! Time source used by the crawl loop to pace batches.
//!
//! [`SystemClock`] waits on the tokio timer. [`FakeClock`] never waits: it
//! moves its own notion of "now" forward and records how long the caller
//! would have waited, so crawl pacing can be asserted without real delays.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, SystemTime};
use tracing::trace;

/// Supplies the current time and two forms of waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;

    /// Waits for `duration`. A zero duration returns immediately.
    async fn sleep(&self, duration: Duration);

    /// Waits until `deadline`. Returns immediately if the deadline is not in
    /// the future.
    async fn sleep_until(&self, deadline: SystemTime);
}

/// Wall-clock implementation backed by `tokio::time`.
///
/// The wait is best effort: a timer woken early is treated as satisfied.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::time::sleep(duration).await;
    }

    async fn sleep_until(&self, deadline: SystemTime) {
        match deadline.duration_since(self.now()) {
            Ok(remaining) => self.sleep(remaining).await,
            Err(_) => trace!("sleep_until deadline already passed"),
        }
    }
}

#[derive(Debug)]
struct FakeClockState {
    now: SystemTime,
    waited: Duration,
}

/// Deterministic clock for tests.
#[derive(Debug)]
pub struct FakeClock {
    state: Mutex<FakeClockState>,
}

impl FakeClock {
    /// Creates a fake clock frozen at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    pub fn starting_at(now: SystemTime) -> Self {
        FakeClock {
            state: Mutex::new(FakeClockState {
                now,
                waited: Duration::ZERO,
            }),
        }
    }

    /// Total simulated time spent in `sleep` and `sleep_until`.
    pub fn time_waited(&self) -> Duration {
        self.state.lock().waited
    }

    /// Moves "now" forward without counting it as waiting.
    pub fn advance(&self, by: Duration) {
        self.state.lock().now += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        self.state.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.now += duration;
        state.waited += duration;
    }

    async fn sleep_until(&self, deadline: SystemTime) {
        let mut state = self.state.lock();
        if let Ok(delta) = deadline.duration_since(state.now) {
            state.now = deadline;
            state.waited += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_clock_accumulates_sleeps() {
        let clock = FakeClock::new();
        let start = clock.now();

        clock.sleep(Duration::from_secs(5)).await;
        clock.sleep(Duration::from_secs(3)).await;

        assert_eq!(clock.time_waited(), Duration::from_secs(8));
        assert_eq!(clock.now(), start + Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_fake_clock_ignores_past_deadline() {
        let clock = FakeClock::new();
        let start = clock.now();

        clock.sleep_until(start - Duration::from_secs(10)).await;

        assert_eq!(clock.now(), start);
        assert_eq!(clock.time_waited(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fake_clock_sleep_until_future() {
        let clock = FakeClock::new();
        let deadline = clock.now() + Duration::from_millis(1500);

        clock.sleep_until(deadline).await;

        assert_eq!(clock.now(), deadline);
        assert_eq!(clock.time_waited(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_advance_is_not_waiting() {
        let clock = FakeClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(2));

        clock.sleep_until(start + Duration::from_secs(3)).await;

        assert_eq!(clock.time_waited(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_sleep() {
        let clock = SystemClock;
        let before = tokio::time::Instant::now();

        clock.sleep(Duration::from_secs(2)).await;
        clock.sleep(Duration::ZERO).await;

        assert!(before.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_system_clock_past_deadline_returns() {
        let clock = SystemClock;
        clock
            .sleep_until(SystemTime::now() - Duration::from_secs(60))
            .await;
    }
}
