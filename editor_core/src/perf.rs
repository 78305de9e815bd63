//! Timing statistics for document operations.

use std::collections::VecDeque;
use std::time::Duration;

/// Maximum number of samples to keep for rolling averages.
const MAX_SAMPLES: usize = 120;

/// Rolling statistics over the most recent samples of one metric.
#[derive(Debug, Clone)]
pub struct RollingStats {
    samples: VecDeque<Duration>,
    sum: Duration,
    max: Duration,
    total: u64,
}

impl Default for RollingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingStats {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            sum: Duration::ZERO,
            max: Duration::ZERO,
            total: 0,
        }
    }

    /// Records a new sample, evicting the oldest when full.
    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() >= MAX_SAMPLES {
            if let Some(old) = self.samples.pop_front() {
                self.sum = self.sum.saturating_sub(old);
            }
        }
        self.samples.push_back(duration);
        self.sum += duration;
        self.max = self.max.max(duration);
        self.total += 1;
    }

    /// Returns the number of samples ever recorded.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the average over the retained samples.
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            Duration::ZERO
        } else {
            self.sum / self.samples.len() as u32
        }
    }

    /// Returns the largest sample ever recorded.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Returns the most recent duration.
    pub fn last(&self) -> Duration {
        self.samples.back().copied().unwrap_or(Duration::ZERO)
    }

    pub fn average_ms(&self) -> f64 {
        self.average().as_secs_f64() * 1000.0
    }
}

/// Timings collected by a document.
#[derive(Debug, Clone, Default)]
pub struct DocumentPerf {
    /// Applying an edit, including cursor upkeep and width invalidation.
    pub edits: RollingStats,
    /// Undo and redo.
    pub history: RollingStats,
    /// One buffer parsed by the background highlighter.
    pub highlight: RollingStats,
    /// Splitting the input into buffers.
    pub load: Option<Duration>,
}

impl DocumentPerf {
    /// Formats a one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "edits: {} (avg {:.3}ms), undo/redo: {} (avg {:.3}ms), highlighted buffers: {} (avg {:.3}ms), load: {:.3}ms",
            self.edits.total(),
            self.edits.average_ms(),
            self.history.total(),
            self.history.average_ms(),
            self.highlight.total(),
            self.highlight.average_ms(),
            self.load.map(|d| d.as_secs_f64() * 1000.0).unwrap_or(0.0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_stats() {
        let mut stats = RollingStats::new();
        assert_eq!(stats.average(), Duration::ZERO);
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(20));
        stats.record(Duration::from_millis(30));
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.average(), Duration::from_millis(20));
        assert_eq!(stats.max(), Duration::from_millis(30));
        assert_eq!(stats.last(), Duration::from_millis(30));
    }

    #[test]
    fn test_rolling_window() {
        let mut stats = RollingStats::new();
        for _ in 0..MAX_SAMPLES {
            stats.record(Duration::from_millis(100));
        }
        for _ in 0..MAX_SAMPLES {
            stats.record(Duration::from_millis(1));
        }
        assert_eq!(stats.average(), Duration::from_millis(1));
        assert_eq!(stats.max(), Duration::from_millis(100));
        assert_eq!(stats.total(), 2 * MAX_SAMPLES as u64);
    }
}
