use std::time::Duration;

use tokio::time::Instant;

/// Decides when accumulated build state is written mid-stream.
///
/// Local builds emit output quickly and are flushed at most once per
/// `interval`. Remote builds never flush per line: their whole log arrives
/// in one poll and is persisted once at end of stream.
#[derive(Debug)]
pub struct FlushThrottle {
    interval: Duration,
    is_remote: bool,
    last_flush: Instant,
}

impl FlushThrottle {
    pub fn new(interval: Duration, is_remote: bool) -> Self {
        Self {
            interval,
            is_remote,
            last_flush: Instant::now(),
        }
    }

    /// True when a mid-stream flush is due.
    pub fn should_flush(&self) -> bool {
        !self.is_remote && self.last_flush.elapsed() >= self.interval
    }

    /// Record a completed flush. Failed flushes are not recorded, so the
    /// next line retries.
    pub fn mark_flushed(&mut self) {
        self.last_flush = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_local_waits_for_interval() {
        let throttle = FlushThrottle::new(SECOND, false);
        assert!(!throttle.should_flush());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!throttle.should_flush());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(throttle.should_flush());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_flushed_restarts_interval() {
        let mut throttle = FlushThrottle::new(SECOND, false);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(throttle.should_flush());

        throttle.mark_flushed();
        assert!(!throttle.should_flush());

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(throttle.should_flush());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_never_flushes_per_line() {
        let throttle = FlushThrottle::new(SECOND, true);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!throttle.should_flush());
    }
}
