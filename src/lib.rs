//! Network Speed Tester
//!
//! A measurement engine that drives concurrent HTTP streams against a remote
//! endpoint to estimate download and upload throughput, then probes the same
//! endpoint sequentially to estimate round-trip latency and jitter.

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod output;
pub mod probe;
pub mod stats;
pub mod throughput;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, ServerEndpoint, TestConfig, TestResult, RateSample};
pub use types::{Direction, TestPhase};
pub use engine::{PhaseStateMachine, EngineContext, EngineEvent, LiveGauge};
pub use monitor::{LiveHealthMonitor, HealthReading};
pub use probe::ProbeSampler;
pub use throughput::{ThroughputTester, SampleAggregator, ByteCounter};
pub use client::{HttpClient, NetworkClient};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_DURATION_MS: u64 = 8_000;
    pub const DEFAULT_STREAM_COUNT: u32 = 6;
    pub const DEFAULT_WARM_UP_MS: u64 = 1_200;
    pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 50;
    pub const DEFAULT_PROBE_COUNT: u32 = 6;
    pub const DEFAULT_PROBE_DELAY_MS: u64 = 120;
    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;
    /// Round-trip time recorded for a probe that never came back
    pub const DEFAULT_PROBE_PENALTY_MS: f64 = 999.0;
    pub const DEFAULT_TRANSITION_MS: u64 = 1_500;
    pub const DEFAULT_PERCENTILE: f64 = 0.8;
    pub const DEFAULT_UPLOAD_PAYLOAD_BYTES: usize = 1024 * 1024;
    pub const DEFAULT_HEALTH_INTERVAL_MS: u64 = 3_500;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Pause between a failed worker attempt and its restart
    pub const WORKER_RESTART_DELAY: Duration = Duration::from_millis(5);

    pub const MAX_STREAM_COUNT: u32 = 64;

    pub const DEFAULT_SERVER_ID: &str = "cloudflare";
    pub const DEFAULT_SERVER_NAME: &str = "Cloudflare";
    pub const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=100000000";
    pub const DEFAULT_UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";
    pub const DEFAULT_TRACE_URL: &str = "https://speed.cloudflare.com/cdn-cgi/trace";

    pub const USER_AGENT: &str = concat!("network-speed-tester/", env!("CARGO_PKG_VERSION"));
}
