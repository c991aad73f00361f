//! Command-line interface for the `nst` binary

use clap::Parser;
use std::path::PathBuf;

/// Network Speed Tester - measure download, upload, latency and jitter against an HTTP endpoint
#[derive(Parser, Debug, Clone)]
#[command(name = "nst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of a speed test server; derives download, upload and trace URLs
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Identifier reported with the result
    #[arg(long, value_name = "ID")]
    pub server_id: Option<String>,

    /// Display name of the server
    #[arg(long, value_name = "NAME")]
    pub server_name: Option<String>,

    /// URL streamed by download workers
    #[arg(long, value_name = "URL")]
    pub download_url: Option<String>,

    /// URL receiving upload bodies
    #[arg(long, value_name = "URL")]
    pub upload_url: Option<String>,

    /// URL used for latency probes
    #[arg(long, value_name = "URL")]
    pub trace_url: Option<String>,

    /// Length of each throughput phase in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub duration: Option<u64>,

    /// Concurrent streams per throughput phase
    #[arg(short, long, value_name = "N")]
    pub streams: Option<u32>,

    /// Samples before this many milliseconds are discarded
    #[arg(long, value_name = "MS")]
    pub warm_up: Option<u64>,

    /// Sampling cadence in milliseconds
    #[arg(long, value_name = "MS")]
    pub sample_interval: Option<u64>,

    /// Number of latency probes
    #[arg(short, long, value_name = "N")]
    pub probes: Option<u32>,

    /// Pause between latency probes in milliseconds
    #[arg(long, value_name = "MS")]
    pub probe_delay: Option<u64>,

    /// Per-probe timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub probe_timeout: Option<u64>,

    /// Round-trip time recorded for a failed probe
    #[arg(long, value_name = "MS")]
    pub probe_penalty: Option<f64>,

    /// Pause between download and upload in milliseconds
    #[arg(long, value_name = "MS")]
    pub transition: Option<u64>,

    /// Rank used to reduce throughput samples, in (0, 1]
    #[arg(long, value_name = "P")]
    pub percentile: Option<f64>,

    /// Size of each upload request body in bytes
    #[arg(long, value_name = "BYTES")]
    pub upload_bytes: Option<usize>,

    /// Interval between health readings in --monitor mode, in milliseconds
    #[arg(long, value_name = "MS")]
    pub health_interval: Option<u64>,

    /// TCP connect timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
    pub connect_timeout: Option<u64>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Keep probing the server after the test until interrupted
    #[arg(long)]
    pub monitor: bool,

    /// Describe the supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,

    /// Write an example .env file to PATH and exit
    #[arg(long, value_name = "PATH")]
    pub write_env_example: Option<PathBuf>,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.server.is_some() && (self.download_url.is_some() || self.upload_url.is_some() || self.trace_url.is_some()) {
            return Err("--server cannot be combined with explicit --download-url, --upload-url or --trace-url".to_string());
        }

        if self.json && self.monitor {
            return Err("--monitor is not available with --json".to_string());
        }

        Ok(())
    }

    /// Whether the invocation only asks for information and runs no test
    pub fn is_info_only(&self) -> bool {
        self.env_help || self.write_env_example.is_some()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color || self.json {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a connect timeout in seconds
fn parse_timeout(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if secs > 300 {
                Err("Timeout cannot exceed 300 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
