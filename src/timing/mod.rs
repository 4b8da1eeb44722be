//! Timing utilities: the pipeline ticker clock, media timestamps and frame rate state

pub mod rate;

pub use rate::{AverageFps, FrameRateController};

use crate::host::Ticker;
use std::sync::Arc;
use std::time::Instant;

/// Media timestamp clock rate for video (Hz)
pub const VIDEO_CLOCK_RATE: u64 = 90_000;

/// Convert ticker milliseconds into 90 kHz media timestamp units
#[inline]
pub fn media_timestamp(ticker_ms: u64) -> u64 {
    ticker_ms * (VIDEO_CLOCK_RATE / 1000)
}

/// Monotonic millisecond clock standing in for the host ticker
///
/// Clones share the same time zero.
#[derive(Debug, Clone)]
pub struct TickerClock {
    start: Arc<Instant>,
}

impl TickerClock {
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Share the timebase of another component
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Milliseconds since the clock was created
    #[inline]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for TickerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for TickerClock {
    fn time_ms(&self) -> u64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_media_timestamp_scale() {
        assert_eq!(media_timestamp(0), 0);
        assert_eq!(media_timestamp(1), 90);
        assert_eq!(media_timestamp(1000), 90_000);
    }

    #[test]
    fn test_ticker_clock_monotonic() {
        let clock = TickerClock::new();
        let t1 = clock.time_ms();
        thread::sleep(Duration::from_millis(5));
        let t2 = clock.time_ms();
        assert!(t2 >= t1 + 5);
    }

    #[test]
    fn test_clones_share_timebase() {
        let clock = TickerClock::new();
        let other = clock.clone();
        assert_eq!(clock.start_instant(), other.start_instant());
    }
}
