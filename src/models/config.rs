//! Configuration data model and validation

use crate::models::{ServerEndpoint, TestConfig};
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identifier of the speed test server
    #[serde(default = "default_server_id")]
    pub server_id: String,

    /// Display name of the speed test server
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// URL streamed by download workers
    #[serde(default = "default_download_url")]
    pub download_url: String,

    /// URL receiving upload POST bodies
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// URL used for latency probes
    #[serde(default = "default_trace_url")]
    pub trace_url: String,

    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,

    #[serde(default = "default_stream_count")]
    pub stream_count: u32,

    #[serde(default = "default_warm_up_ms")]
    pub warm_up_ms: u64,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_probe_count")]
    pub probe_count: u32,

    #[serde(default = "default_probe_delay_ms")]
    pub probe_delay_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_probe_penalty_ms")]
    pub probe_penalty_ms: f64,

    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,

    #[serde(default = "default_percentile")]
    pub percentile: f64,

    #[serde(default = "default_upload_payload_bytes")]
    pub upload_payload_bytes: usize,

    /// Interval between ambient health probes while idle
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,

    /// Connect timeout for every HTTP request, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_seconds: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Print the final result as JSON
    #[serde(default)]
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            server_name: default_server_name(),
            download_url: default_download_url(),
            upload_url: default_upload_url(),
            trace_url: default_trace_url(),
            duration_ms: default_duration_ms(),
            stream_count: default_stream_count(),
            warm_up_ms: default_warm_up_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            probe_count: default_probe_count(),
            probe_delay_ms: default_probe_delay_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_penalty_ms: default_probe_penalty_ms(),
            transition_ms: default_transition_ms(),
            percentile: default_percentile(),
            upload_payload_bytes: default_upload_payload_bytes(),
            health_interval_ms: default_health_interval_ms(),
            connect_timeout_seconds: default_connect_timeout_secs(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            json: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    /// The endpoint descriptor handed to the engine
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint::new(
            self.server_id.clone(),
            self.server_name.clone(),
            self.download_url.clone(),
            self.upload_url.clone(),
            self.trace_url.clone(),
        )
    }

    /// The measurement parameters handed to the engine
    pub fn test_config(&self) -> TestConfig {
        TestConfig {
            duration_ms: self.duration_ms,
            stream_count: self.stream_count,
            warm_up_ms: self.warm_up_ms,
            sample_interval_ms: self.sample_interval_ms,
            probe_count: self.probe_count,
            probe_delay_ms: self.probe_delay_ms,
            probe_timeout_ms: self.probe_timeout_ms,
            probe_penalty_ms: self.probe_penalty_ms,
            transition_ms: self.transition_ms,
            percentile: self.percentile,
            upload_payload_bytes: self.upload_payload_bytes,
        }
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        self.endpoint()
            .validate()
            .map_err(|e| AppError::config(e.to_string()))?;

        self.test_config()
            .validate()
            .map_err(|e| AppError::config(e.to_string()))?;

        if self.health_interval_ms == 0 {
            return Err(AppError::config("Health interval must be greater than 0"));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(AppError::config("Connect timeout must be greater than 0"));
        }

        if self.connect_timeout_seconds > 300 {
            return Err(AppError::config("Connect timeout cannot exceed 300 seconds"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Some(value) = env_string("SPEEDTEST_SERVER_ID") {
            self.server_id = value;
        }
        if let Some(value) = env_string("SPEEDTEST_SERVER_NAME") {
            self.server_name = value;
        }
        if let Some(value) = env_string("DOWNLOAD_URL") {
            self.download_url = value;
        }
        if let Some(value) = env_string("UPLOAD_URL") {
            self.upload_url = value;
        }
        if let Some(value) = env_string("TRACE_URL") {
            self.trace_url = value;
        }

        env_parse("TEST_DURATION_MS", &mut self.duration_ms)?;
        env_parse("STREAM_COUNT", &mut self.stream_count)?;
        env_parse("WARM_UP_MS", &mut self.warm_up_ms)?;
        env_parse("SAMPLE_INTERVAL_MS", &mut self.sample_interval_ms)?;
        env_parse("PROBE_COUNT", &mut self.probe_count)?;
        env_parse("PROBE_DELAY_MS", &mut self.probe_delay_ms)?;
        env_parse("PROBE_TIMEOUT_MS", &mut self.probe_timeout_ms)?;
        env_parse("PROBE_PENALTY_MS", &mut self.probe_penalty_ms)?;
        env_parse("TRANSITION_MS", &mut self.transition_ms)?;
        env_parse("PERCENTILE", &mut self.percentile)?;
        env_parse("UPLOAD_PAYLOAD_BYTES", &mut self.upload_payload_bytes)?;
        env_parse("HEALTH_INTERVAL_MS", &mut self.health_interval_ms)?;
        env_parse("CONNECT_TIMEOUT_SECONDS", &mut self.connect_timeout_seconds)?;
        env_parse("ENABLE_COLOR", &mut self.enable_color)?;

        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = env_string(key) {
        *target = raw
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, raw, e)))?;
    }
    Ok(())
}

// Default value functions for serde
fn default_server_id() -> String {
    crate::defaults::DEFAULT_SERVER_ID.to_string()
}

fn default_server_name() -> String {
    crate::defaults::DEFAULT_SERVER_NAME.to_string()
}

fn default_download_url() -> String {
    crate::defaults::DEFAULT_DOWNLOAD_URL.to_string()
}

fn default_upload_url() -> String {
    crate::defaults::DEFAULT_UPLOAD_URL.to_string()
}

fn default_trace_url() -> String {
    crate::defaults::DEFAULT_TRACE_URL.to_string()
}

fn default_duration_ms() -> u64 {
    crate::defaults::DEFAULT_DURATION_MS
}

fn default_stream_count() -> u32 {
    crate::defaults::DEFAULT_STREAM_COUNT
}

fn default_warm_up_ms() -> u64 {
    crate::defaults::DEFAULT_WARM_UP_MS
}

fn default_sample_interval_ms() -> u64 {
    crate::defaults::DEFAULT_SAMPLE_INTERVAL_MS
}

fn default_probe_count() -> u32 {
    crate::defaults::DEFAULT_PROBE_COUNT
}

fn default_probe_delay_ms() -> u64 {
    crate::defaults::DEFAULT_PROBE_DELAY_MS
}

fn default_probe_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_PROBE_TIMEOUT_MS
}

fn default_probe_penalty_ms() -> f64 {
    crate::defaults::DEFAULT_PROBE_PENALTY_MS
}

fn default_transition_ms() -> u64 {
    crate::defaults::DEFAULT_TRANSITION_MS
}

fn default_percentile() -> f64 {
    crate::defaults::DEFAULT_PERCENTILE
}

fn default_upload_payload_bytes() -> usize {
    crate::defaults::DEFAULT_UPLOAD_PAYLOAD_BYTES
}

fn default_health_interval_ms() -> u64 {
    crate::defaults::DEFAULT_HEALTH_INTERVAL_MS
}

fn default_connect_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_test_config_mirrors_fields() {
        let mut config = Config::default();
        config.stream_count = 3;
        config.percentile = 0.5;

        let test_config = config.test_config();
        assert_eq!(test_config.stream_count, 3);
        assert_eq!(test_config.percentile, 0.5);
        assert_eq!(test_config.duration_ms, crate::defaults::DEFAULT_DURATION_MS);
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = Config::default();
        let endpoint = config.endpoint();
        assert_eq!(endpoint.id, "cloudflare");
        assert!(endpoint.trace_url.ends_with("/cdn-cgi/trace"));
    }

    #[test]
    fn test_zero_streams_invalid() {
        let mut config = Config::default();
        config.stream_count = 0;
        let error = config.validate().unwrap_err();
        assert_eq!(error.category(), "CONFIG");
    }

    #[test]
    fn test_invalid_download_url() {
        let mut config = Config::default();
        config.download_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_health_interval_invalid() {
        let mut config = Config::default();
        config.health_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: Config = serde_json::from_str(r#"{"stream_count": 2, "json": true}"#).unwrap();
        assert_eq!(config.stream_count, 2);
        assert!(config.json);
        assert_eq!(config.warm_up_ms, crate::defaults::DEFAULT_WARM_UP_MS);
    }
}
