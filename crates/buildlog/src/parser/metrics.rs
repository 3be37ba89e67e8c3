use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A wrapper that forces the wrapped data onto its own cache line(s).
///
/// Parses of different candidates run on different worker threads and all
/// bump the same counters; keeping the hot line counters apart from the
/// flush counters avoids false sharing between them.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Per-line counters (hottest path - updated once per line)
#[derive(Debug, Default)]
pub struct LineMetrics {
    pub lines: AtomicU64,
    pub skipped: AtomicU64,
    pub anomalies: AtomicU64,
}

/// Store interaction counters
#[derive(Debug, Default)]
pub struct FlushMetrics {
    pub flushes: AtomicU64,
    pub failed_flushes: AtomicU64,
}

/// Parse lifecycle counters
#[derive(Debug, Default)]
pub struct RunMetrics {
    pub parses: AtomicU64,
    pub failed_parses: AtomicU64,
    pub time_nanos: AtomicU64,
}

/// Process-wide build output parsing metrics.
///
/// Shared (`Arc`) by every parse invocation in the process. All operations
/// use `Ordering::Relaxed`; `snapshot()` is not transactional across fields.
#[derive(Debug, Default)]
pub struct ParsingMetrics {
    pub lines: CacheAligned<LineMetrics>,
    pub flushes: CacheAligned<FlushMetrics>,
    pub runs: CacheAligned<RunMetrics>,
}

impl ParsingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_line(&self) {
        self.lines.0.lines.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.lines.0.skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_anomaly(&self) {
        self.lines.0.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, success: bool) {
        if success {
            self.flushes.0.flushes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.flushes.0.failed_flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a finished parse invocation.
    pub fn record_parse(&self, success: bool, time_nanos: u64) {
        self.runs.0.parses.fetch_add(1, Ordering::Relaxed);
        self.runs.0.time_nanos.fetch_add(time_nanos, Ordering::Relaxed);
        if !success {
            self.runs.0.failed_parses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let parses = self.runs.0.parses.load(Ordering::Relaxed);
        let time_nanos = self.runs.0.time_nanos.load(Ordering::Relaxed);
        let avg_parse_time_nanos = if parses > 0 { time_nanos / parses } else { 0 };

        MetricsSnapshot {
            lines: self.lines.0.lines.load(Ordering::Relaxed),
            skipped: self.lines.0.skipped.load(Ordering::Relaxed),
            anomalies: self.lines.0.anomalies.load(Ordering::Relaxed),
            flushes: self.flushes.0.flushes.load(Ordering::Relaxed),
            failed_flushes: self.flushes.0.failed_flushes.load(Ordering::Relaxed),
            parses,
            failed_parses: self.runs.0.failed_parses.load(Ordering::Relaxed),
            avg_parse_time_nanos,
        }
    }
}

/// Serializable point-in-time view of [`ParsingMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub lines: u64,
    pub skipped: u64,
    pub anomalies: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub parses: u64,
    pub failed_parses: u64,
    pub avg_parse_time_nanos: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cache_alignment() {
        assert_eq!(std::mem::align_of::<CacheAligned<LineMetrics>>(), 64);
    }

    #[test]
    fn test_snapshot_counts() {
        let metrics = ParsingMetrics::new();
        metrics.record_line();
        metrics.record_line();
        metrics.record_skipped();
        metrics.record_anomaly();
        metrics.record_flush(true);
        metrics.record_flush(false);
        metrics.record_parse(true, 100);
        metrics.record_parse(false, 300);

        let snap = metrics.snapshot();
        assert_eq!(snap.lines, 2);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.anomalies, 1);
        assert_eq!(snap.flushes, 1);
        assert_eq!(snap.failed_flushes, 1);
        assert_eq!(snap.parses, 2);
        assert_eq!(snap.failed_parses, 1);
        assert_eq!(snap.avg_parse_time_nanos, 200);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(ParsingMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        m.record_line();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().lines, 4000);
    }
}
