//! Reductions from raw measurements to reported figures
//!
//! Latency probes are reduced by trimming the extremes and averaging.
//! Throughput samples are reduced by picking a percentile rank, which keeps
//! the figure close to the sustained peak without chasing a single spike.

use crate::models::LatencyEstimate;


/// Sort samples ascending and drop the single lowest and highest value
///
/// Sets with fewer than three samples are returned sorted but untrimmed.
pub fn trim_outliers(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    if sorted.len() >= 3 {
        sorted.pop();
        sorted.remove(0);
    }

    sorted
}

/// Arithmetic mean, or None for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Reduce probe round-trip times to a latency and jitter estimate
///
/// `rtts` already contains the penalty value for every failed probe, so a
/// run where all probes failed reports the penalty as its latency.
pub fn latency_estimate(rtts: &[f64], failed_probes: u32) -> LatencyEstimate {
    let trimmed = trim_outliers(rtts);

    let latency = mean(&trimmed).unwrap_or(0.0);
    let jitter = match (trimmed.first(), trimmed.last()) {
        (Some(min), Some(max)) => max - min,
        _ => 0.0,
    };

    LatencyEstimate {
        latency_ms: round_ms(latency),
        jitter_ms: round_ms(jitter),
        probes: rtts.len() as u32,
        failed_probes,
    }
}

fn round_ms(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// Index selected by a percentile rank over `len` sorted values
///
/// Computed as `floor(len * percentile)` and clamped to the last element.
pub fn percentile_index(len: usize, percentile: f64) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let rank = (len as f64 * percentile).floor();
    let index = if rank.is_finite() && rank > 0.0 { rank as usize } else { 0 };
    Some(index.min(len - 1))
}

/// Value at the given percentile rank, or 0.0 when there are no values
pub fn percentile_reduce(values: &[f64], percentile: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    percentile_index(sorted.len(), percentile)
        .map(|index| sorted[index])
        .unwrap_or(0.0)
}

/// Convert a byte count over an elapsed time to megabits per second
pub fn bytes_to_mbps(bytes: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (elapsed_ms as f64 * 1000.0)
}
