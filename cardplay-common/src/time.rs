//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Monotonic millisecond clock
///
/// Scheduler deadlines and visibility timestamps are plain `u64` milliseconds.
/// Hosts and the preview timer driver share one `MonotonicClock` so both speak
/// the same timebase. Backed by tokio's clock, so a paused test runtime
/// controls it too.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock whose zero is "now"
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Instant corresponding to a millisecond reading of this clock
    pub fn instant_at(&self, ms: u64) -> Instant {
        self.origin + millis_to_duration(ms)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, Duration::from_secs(1));
    }

    #[test]
    fn test_clock_starts_near_zero() {
        let clock = MonotonicClock::new();
        assert!(clock.now_ms() < 1000);
    }

    #[test]
    fn test_clock_instant_at_round_trips() {
        let clock = MonotonicClock::new();
        let at = clock.instant_at(250);
        assert_eq!(at.duration_since(clock.origin), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_paused_runtime() {
        let clock = MonotonicClock::new();
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(clock.now_ms(), 1500);
    }

    #[tokio::test]
    async fn test_clock_advances() {
        let clock = MonotonicClock::new();
        let before = clock.now_ms();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(clock.now_ms() >= before + 10);
    }
}
