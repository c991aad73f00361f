//! Measurement parameters and result data models

use crate::types::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of a single speed test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Wall-clock budget of each throughput phase
    pub duration_ms: u64,
    /// Concurrent workers per throughput phase
    pub stream_count: u32,
    /// Leading part of a throughput phase whose samples are display-only
    pub warm_up_ms: u64,
    /// Cadence of rate samples
    pub sample_interval_ms: u64,
    pub probe_count: u32,
    /// Pause between consecutive latency probes
    pub probe_delay_ms: u64,
    pub probe_timeout_ms: u64,
    /// Round-trip time recorded for a failed probe
    pub probe_penalty_ms: f64,
    /// Settling pause between download and upload
    pub transition_ms: u64,
    /// Rank used to reduce retained rate samples, in (0, 1]
    pub percentile: f64,
    pub upload_payload_bytes: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        use crate::defaults::*;
        Self {
            duration_ms: DEFAULT_DURATION_MS,
            stream_count: DEFAULT_STREAM_COUNT,
            warm_up_ms: DEFAULT_WARM_UP_MS,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            probe_count: DEFAULT_PROBE_COUNT,
            probe_delay_ms: DEFAULT_PROBE_DELAY_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            probe_penalty_ms: DEFAULT_PROBE_PENALTY_MS,
            transition_ms: DEFAULT_TRANSITION_MS,
            percentile: DEFAULT_PERCENTILE,
            upload_payload_bytes: DEFAULT_UPLOAD_PAYLOAD_BYTES,
        }
    }
}

impl TestConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    /// Reject parameters the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.duration_ms == 0 {
            return Err(AppError::validation("duration_ms must be greater than 0"));
        }

        let max_streams = crate::defaults::MAX_STREAM_COUNT;
        if self.stream_count == 0 || self.stream_count > max_streams {
            return Err(AppError::validation(format!(
                "stream_count must be between 1 and {}, got {}",
                max_streams, self.stream_count
            )));
        }

        let windows = [
            ("warm_up_ms", self.warm_up_ms),
            ("sample_interval_ms", self.sample_interval_ms),
            ("probe_delay_ms", self.probe_delay_ms),
            ("transition_ms", self.transition_ms),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(AppError::validation(format!("{} must be greater than 0", name)));
            }
        }

        if self.probe_count == 0 {
            return Err(AppError::validation("probe_count must be greater than 0"));
        }

        if self.probe_timeout_ms == 0 {
            return Err(AppError::validation("probe_timeout_ms must be greater than 0"));
        }

        if !self.probe_penalty_ms.is_finite() || self.probe_penalty_ms <= 0.0 {
            return Err(AppError::validation("probe_penalty_ms must be a positive number"));
        }

        if !(self.percentile > 0.0 && self.percentile <= 1.0) {
            return Err(AppError::validation(format!(
                "percentile must be within (0, 1], got {}",
                self.percentile
            )));
        }

        if self.upload_payload_bytes == 0 {
            return Err(AppError::validation("upload_payload_bytes must be greater than 0"));
        }

        Ok(())
    }
}

/// One instantaneous throughput reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub elapsed_ms: u64,
    pub mbps: f64,
}

/// Latency and jitter reduced from a set of probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyEstimate {
    pub latency_ms: u32,
    pub jitter_ms: u32,
    /// Probes attempted
    pub probes: u32,
    /// Probes that timed out or failed and were recorded at the penalty value
    pub failed_probes: u32,
}

/// Consolidated outcome of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    server_id: String,
    download_mbps: f64,
    upload_mbps: f64,
    latency_ms: u32,
    jitter_ms: u32,
    produced_at: DateTime<Utc>,
}

impl TestResult {
    pub fn new(
        server_id: impl Into<String>,
        download_mbps: f64,
        upload_mbps: f64,
        latency: LatencyEstimate,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            download_mbps,
            upload_mbps,
            latency_ms: latency.latency_ms,
            jitter_ms: latency.jitter_ms,
            produced_at: Utc::now(),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn download_mbps(&self) -> f64 {
        self.download_mbps
    }

    pub fn upload_mbps(&self) -> f64 {
        self.upload_mbps
    }

    pub fn latency_ms(&self) -> u32 {
        self.latency_ms
    }

    pub fn jitter_ms(&self) -> u32 {
        self.jitter_ms
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }
}

/// One ambient reachability reading taken while the engine is at rest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthReading {
    /// Rounded round-trip time, or None when the target did not answer
    pub latency_ms: Option<u32>,
    pub measured_at: DateTime<Utc>,
}

impl HealthReading {
    pub fn from_rtt(rtt_ms: Option<f64>) -> Self {
        Self {
            latency_ms: rtt_ms.map(|ms| ms.round().max(0.0) as u32),
            measured_at: Utc::now(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.latency_ms.is_some()
    }
}
