//! Session metrics for sampling-interval monitoring.
//!
//! Provides a ring buffer-based histogram over achieved inter-sample
//! intervals without heap allocations on the record path. The sampling
//! period is timed with a software poll loop rather than a hardware timer
//! compare, so the achieved interval is expected to run slightly over the
//! nominal period; the late threshold separates normal poll-granularity
//! slack from genuinely stretched periods.

use std::time::Duration;

/// Inter-sample interval metrics with ring buffer for jitter tracking.
#[derive(Debug)]
pub struct SampleMetrics {
    /// Ring buffer of intervals in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples collected (saturates at buffer size).
    sample_count: usize,
    /// Total intervals recorded.
    total_samples: u64,
    /// Minimum observed interval in nanoseconds.
    min_ns: u64,
    /// Maximum observed interval in nanoseconds.
    max_ns: u64,
    /// Sum of all intervals for mean calculation.
    sum_ns: u64,
    /// Number of intervals exceeding the late threshold.
    late_count: u64,
    /// Late threshold in nanoseconds.
    late_threshold_ns: u64,
}

impl SampleMetrics {
    /// Create a new metrics collector with the given histogram size.
    ///
    /// # Arguments
    ///
    /// * `histogram_size` - Number of intervals to retain in the ring buffer.
    /// * `late_threshold` - Intervals exceeding this count as late.
    #[must_use]
    pub fn new(histogram_size: usize, late_threshold: Duration) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_samples: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            late_count: 0,
            late_threshold_ns: late_threshold.as_nanos() as u64,
        }
    }

    /// Record one achieved inter-sample interval.
    ///
    /// Allocation-free for use on the sampling path.
    pub fn record(&mut self, interval: Duration) {
        let ns = interval.as_nanos() as u64;

        // Update ring buffer
        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        // Update statistics
        self.total_samples += 1;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);

        if ns > self.late_threshold_ns {
            self.late_count += 1;
        }
    }

    /// Get total number of intervals recorded.
    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Get minimum observed interval.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        if self.total_samples > 0 {
            Some(Duration::from_nanos(self.min_ns))
        } else {
            None
        }
    }

    /// Get maximum observed interval.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        if self.total_samples > 0 {
            Some(Duration::from_nanos(self.max_ns))
        } else {
            None
        }
    }

    /// Get mean interval.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        if self.total_samples > 0 {
            Some(Duration::from_nanos(self.sum_ns / self.total_samples))
        } else {
            None
        }
    }

    /// Get number of late intervals.
    #[must_use]
    pub fn late_count(&self) -> u64 {
        self.late_count
    }

    /// Compute a percentile from the ring buffer.
    ///
    /// # Arguments
    ///
    /// * `percentile` - Percentile to compute (0.0 to 100.0).
    ///
    /// Returns `None` if no intervals have been recorded or if percentile
    /// is out of range.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 {
            return None;
        }

        if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
            return None;
        }

        // Copy and sort samples
        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        let idx = idx.min(sorted.len() - 1);

        Some(Duration::from_nanos(sorted[idx]))
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_samples: self.total_samples,
            min_ns: if self.total_samples > 0 {
                Some(self.min_ns)
            } else {
                None
            },
            max_ns: if self.total_samples > 0 {
                Some(self.max_ns)
            } else {
                None
            },
            mean_ns: if self.total_samples > 0 {
                Some(self.sum_ns / self.total_samples)
            } else {
                None
            },
            late_count: self.late_count,
            sample_count: self.sample_count,
        }
    }

    /// Reset all metrics to initial state.
    pub fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.total_samples = 0;
        self.min_ns = u64::MAX;
        self.max_ns = 0;
        self.sum_ns = 0;
        self.late_count = 0;
    }
}

/// Immutable snapshot of metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total intervals recorded.
    pub total_samples: u64,
    /// Minimum interval in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum interval in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean interval in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Number of late intervals.
    pub late_count: u64,
    /// Number of intervals in the histogram.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Get jitter (max - min) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
