//! Pacing and wall-clock sources for the player.
//!
//! Both are traits so tests can drive playback synchronously and with a fixed
//! time of day.

use std::time::Duration;

use chrono::{Local, NaiveTime};

/// Waits between ticks.
#[async_trait::async_trait]
pub trait TickSource: Send {
    /// Called after `tick` has been rendered and before the next one starts.
    async fn wait(&mut self, tick: u32, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepTicker;

#[async_trait::async_trait]
impl TickSource for SleepTicker {
    async fn wait(&mut self, _tick: u32, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Returns immediately but yields to the runtime, recording how many waits
/// were requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTicker {
    waits: u32,
}

impl ImmediateTicker {
    /// Create a ticker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of waits requested so far.
    #[must_use]
    pub fn waits(&self) -> u32 {
        self.waits
    }
}

#[async_trait::async_trait]
impl TickSource for ImmediateTicker {
    async fn wait(&mut self, _tick: u32, _delay: Duration) {
        self.waits += 1;
        tokio::task::yield_now().await;
    }
}

/// Source of the time of day stamped onto log entries.
pub trait Clock: Send + Sync {
    /// Current time of day.
    fn now(&self) -> NaiveTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// Always reports the same time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_ticker_counts_waits() {
        let mut ticker = ImmediateTicker::new();
        ticker.wait(0, Duration::from_secs(60)).await;
        ticker.wait(1, Duration::from_secs(60)).await;
        assert_eq!(ticker.waits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_ticker_advances_virtual_time() {
        let start = tokio::time::Instant::now();
        let mut ticker = SleepTicker;
        ticker.wait(0, Duration::from_millis(150)).await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_sleep_ticker_zero_delay() {
        let mut ticker = SleepTicker;
        ticker.wait(0, Duration::ZERO).await;
    }

    #[test]
    fn test_fixed_clock() {
        let time = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        assert_eq!(FixedClock(time).now(), time);
    }

    #[test]
    fn test_local_clock_runs() {
        let _ = LocalClock.now();
    }
}
