//! Batch scheduling - pure flush-decision logic.
//!
//! Decides when the worker should drain a batch: when the buffered span
//! count reaches the size threshold, or when the flush interval elapses
//! since the last flush, whichever comes first. This is a pure object with
//! no `Arc` and no atomics; the worker owns it and concurrency stays in
//! `pipeline`.
//!
//! Backpressure: if overflow drops keep appearing, the effective flush
//! interval is widened (doubled, capped at [`MAX_WIDEN_FACTOR`]x the
//! configured interval) so a struggling backend is not hammered with more
//! frequent exports while it is already behind. A clean observation window
//! narrows one step back toward the configured interval. Widening never
//! drops data by itself; overflow and retry-exhaustion stay the only loss
//! paths.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cap on backpressure widening of the flush interval.
const MAX_WIDEN_FACTOR: u32 = 4;

/// Size-or-interval flush trigger with backpressure widening.
#[derive(Debug)]
pub struct BatchScheduler {
    batch_size: usize,
    flush_interval: Duration,
    last_flush: Instant,
    /// Current widening multiplier (1 = configured interval).
    widen_factor: u32,
    /// Overflow-drop total at the last observation.
    last_observed_drops: u64,
}

impl BatchScheduler {
    /// Creates a scheduler for the given thresholds.
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size,
            flush_interval,
            last_flush: Instant::now(),
            widen_factor: 1,
            last_observed_drops: 0,
        }
    }

    /// Flush interval after backpressure widening.
    pub fn effective_interval(&self) -> Duration {
        self.flush_interval * self.widen_factor
    }

    /// Returns true when a batch should be drained and exported now.
    pub fn should_flush(&self, buffered: usize) -> bool {
        buffered > 0
            && (buffered >= self.batch_size
                || self.last_flush.elapsed() >= self.effective_interval())
    }

    /// Records that a flush happened (restarting the interval clock).
    pub fn note_flush(&mut self) {
        self.last_flush = Instant::now();
    }

    /// Feeds the cumulative overflow-drop counter once per observation
    /// window; widens on sustained overflow, narrows on a clean window.
    pub fn observe_drops(&mut self, total_dropped: u64) {
        let delta = total_dropped.saturating_sub(self.last_observed_drops);
        self.last_observed_drops = total_dropped;

        if delta > 0 {
            if self.widen_factor < MAX_WIDEN_FACTOR {
                self.widen_factor *= 2;
                debug!(
                    widen_factor = self.widen_factor,
                    dropped_in_window = delta,
                    "buffer overflow observed, widening flush interval"
                );
            }
        } else if self.widen_factor > 1 {
            self.widen_factor /= 2;
            debug!(
                widen_factor = self.widen_factor,
                "overflow subsided, narrowing flush interval"
            );
        }
    }

    /// Size threshold (spans per batch).
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_size_threshold_triggers() {
        let scheduler = BatchScheduler::new(10, Duration::from_secs(60));
        assert!(!scheduler.should_flush(0));
        assert!(!scheduler.should_flush(9));
        assert!(scheduler.should_flush(10));
        assert!(scheduler.should_flush(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_triggers_below_threshold() {
        let mut scheduler = BatchScheduler::new(1_000, Duration::from_millis(100));
        scheduler.note_flush();
        assert!(!scheduler.should_flush(1));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(scheduler.should_flush(1));
        // Empty buffer never flushes, even past the interval
        assert!(!scheduler.should_flush(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backpressure_widens_and_narrows() {
        let mut scheduler = BatchScheduler::new(1_000, Duration::from_millis(100));
        assert_eq!(scheduler.effective_interval(), Duration::from_millis(100));

        scheduler.observe_drops(5);
        assert_eq!(scheduler.effective_interval(), Duration::from_millis(200));
        scheduler.observe_drops(9);
        assert_eq!(scheduler.effective_interval(), Duration::from_millis(400));
        // Capped
        scheduler.observe_drops(20);
        assert_eq!(scheduler.effective_interval(), Duration::from_millis(400));

        // Clean windows narrow back down
        scheduler.observe_drops(20);
        assert_eq!(scheduler.effective_interval(), Duration::from_millis(200));
        scheduler.observe_drops(20);
        assert_eq!(scheduler.effective_interval(), Duration::from_millis(100));
        scheduler.observe_drops(20);
        assert_eq!(scheduler.effective_interval(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_widened_interval_delays_time_flush() {
        let mut scheduler = BatchScheduler::new(1_000, Duration::from_millis(100));
        scheduler.observe_drops(1); // widen to 200ms
        scheduler.note_flush();

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(!scheduler.should_flush(1));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(scheduler.should_flush(1));
    }
}
