//! Data models and structures for the network speed tester

pub mod config;
pub mod endpoint;
pub mod result;

// Re-export main model types
pub use config::Config;
pub use endpoint::ServerEndpoint;
pub use result::{HealthReading, LatencyEstimate, RateSample, TestConfig, TestResult};
