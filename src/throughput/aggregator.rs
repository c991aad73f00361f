//! Fixed-cadence rate sampling with warm-up exclusion

use crate::models::RateSample;
use crate::stats;

/// Turns cumulative byte totals into rate samples and reduces them
///
/// Every tick produces a display sample; only ticks past the warm-up window
/// are kept for the final figure.
#[derive(Debug, Clone)]
pub struct SampleAggregator {
    warm_up_ms: u64,
    percentile: f64,
    retained: Vec<RateSample>,
    ticks: u64,
}

impl SampleAggregator {
    pub fn new(warm_up_ms: u64, percentile: f64) -> Self {
        Self {
            warm_up_ms,
            percentile,
            retained: Vec::new(),
            ticks: 0,
        }
    }

    /// Record the byte total observed `elapsed_ms` into the phase
    ///
    /// Returns None only when no time has elapsed yet.
    pub fn tick(&mut self, elapsed_ms: u64, total_bytes: u64) -> Option<RateSample> {
        if elapsed_ms == 0 {
            return None;
        }

        self.ticks += 1;
        let sample = RateSample {
            elapsed_ms,
            mbps: stats::bytes_to_mbps(total_bytes, elapsed_ms),
        };

        if elapsed_ms > self.warm_up_ms {
            self.retained.push(sample);
        }

        Some(sample)
    }

    /// Samples kept for reduction, in tick order
    pub fn retained(&self) -> &[RateSample] {
        &self.retained
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Percentile of the retained samples, or 0.0 when nothing was retained
    pub fn reduce(&self) -> f64 {
        let rates: Vec<f64> = self.retained.iter().map(|sample| sample.mbps).collect();
        stats::percentile_reduce(&rates, self.percentile)
    }
}
