//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        let mut content = String::from(
            "# Network Speed Tester Configuration\n\
             #\n\
             # Values set here are used as defaults and can be overridden by\n\
             # environment variables and command-line arguments.\n\n",
        );

        for (name, description, example) in Self::get_supported_env_vars() {
            content.push_str(&format!("# {}\n# {}={}\n\n", description, name, example));
        }

        content.push_str(
            "# Short smoke test against a local server:\n\
             # DOWNLOAD_URL=http://127.0.0.1:8080/__down?bytes=10000000\n\
             # UPLOAD_URL=http://127.0.0.1:8080/__up\n\
             # TRACE_URL=http://127.0.0.1:8080/cdn-cgi/trace\n\
             # TEST_DURATION_MS=3000\n\
             # WARM_UP_MS=500\n",
        );
        content
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "DOWNLOAD_URL" | "UPLOAD_URL" | "TRACE_URL" => {
                let parsed = url::Url::parse(value)
                    .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", key, value, e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::config(format!("{} must use http or https: {}", key, value)));
                }
            }
            "SPEEDTEST_SERVER_ID" | "SPEEDTEST_SERVER_NAME" => {
                if value.trim().is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            "STREAM_COUNT" => {
                let streams = parse_value::<u32>(key, value)?;
                if streams == 0 || streams > crate::defaults::MAX_STREAM_COUNT {
                    return Err(AppError::config(format!(
                        "STREAM_COUNT must be between 1 and {}, got: {}",
                        crate::defaults::MAX_STREAM_COUNT,
                        streams
                    )));
                }
            }
            "PROBE_COUNT" => {
                if parse_value::<u32>(key, value)? == 0 {
                    return Err(AppError::config("PROBE_COUNT must be greater than 0"));
                }
            }
            "TEST_DURATION_MS" | "WARM_UP_MS" | "SAMPLE_INTERVAL_MS" | "PROBE_DELAY_MS" | "PROBE_TIMEOUT_MS"
            | "TRANSITION_MS" | "HEALTH_INTERVAL_MS" => {
                if parse_value::<u64>(key, value)? == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "UPLOAD_PAYLOAD_BYTES" => {
                if parse_value::<usize>(key, value)? == 0 {
                    return Err(AppError::config("UPLOAD_PAYLOAD_BYTES must be greater than 0"));
                }
            }
            "PROBE_PENALTY_MS" => {
                let penalty = parse_value::<f64>(key, value)?;
                if !penalty.is_finite() || penalty <= 0.0 {
                    return Err(AppError::config(format!("PROBE_PENALTY_MS must be positive, got: {}", value)));
                }
            }
            "PERCENTILE" => {
                let percentile = parse_value::<f64>(key, value)?;
                if !(percentile > 0.0 && percentile <= 1.0) {
                    return Err(AppError::config(format!("PERCENTILE must be in (0, 1], got: {}", value)));
                }
            }
            "CONNECT_TIMEOUT_SECONDS" => {
                let timeout = parse_value::<u64>(key, value)?;
                if timeout == 0 || timeout > 300 {
                    return Err(AppError::config(format!(
                        "CONNECT_TIMEOUT_SECONDS must be between 1 and 300, got: {}",
                        timeout
                    )));
                }
            }
            "ENABLE_COLOR" => {
                parse_value::<bool>(key, value)?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SPEEDTEST_SERVER_ID", "Identifier reported with the result", "cloudflare"),
            ("SPEEDTEST_SERVER_NAME", "Display name of the server", "Cloudflare"),
            ("DOWNLOAD_URL", "URL streamed by download workers", "https://speed.cloudflare.com/__down?bytes=100000000"),
            ("UPLOAD_URL", "URL receiving upload bodies", "https://speed.cloudflare.com/__up"),
            ("TRACE_URL", "URL used for latency probes", "https://speed.cloudflare.com/cdn-cgi/trace"),
            ("TEST_DURATION_MS", "Length of each throughput phase in milliseconds", "8000"),
            ("STREAM_COUNT", "Concurrent streams per phase (1-64)", "6"),
            ("WARM_UP_MS", "Initial window excluded from throughput samples", "1200"),
            ("SAMPLE_INTERVAL_MS", "Throughput sampling cadence in milliseconds", "50"),
            ("PROBE_COUNT", "Number of latency probes", "6"),
            ("PROBE_DELAY_MS", "Pause between latency probes in milliseconds", "120"),
            ("PROBE_TIMEOUT_MS", "Per-probe timeout in milliseconds", "2000"),
            ("PROBE_PENALTY_MS", "Round-trip time recorded for a failed probe", "999"),
            ("TRANSITION_MS", "Pause between download and upload in milliseconds", "1500"),
            ("PERCENTILE", "Rank used to reduce throughput samples, in (0, 1]", "0.8"),
            ("UPLOAD_PAYLOAD_BYTES", "Size of each upload request body", "1048576"),
            ("HEALTH_INTERVAL_MS", "Interval between health readings in monitor mode", "3500"),
            ("CONNECT_TIMEOUT_SECONDS", "TCP connect timeout in seconds (1-300)", "10"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, value.trim())
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Check a .env-style file and report problems per line
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => {
                    if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                        warnings.push(format!("Line '{}': {}", line, e));
                    }
                }
                None => warnings.push(format!("Line '{}': expected KEY=VALUE", line)),
            }
        }

        Ok(Some(warnings))
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_LOCK;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_content_lists_every_variable() {
        let content = EnvManager::create_example_env_content();

        assert!(content.contains("Network Speed Tester Configuration"));
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            assert!(content.contains(&format!("# {}=", name)), "missing {}", name);
        }
    }

    #[test]
    fn test_saved_example_is_clean() {
        let temp_file = NamedTempFile::new().unwrap();
        EnvManager::save_example_env_file(temp_file.path()).unwrap();

        // Every line is a comment, so checking it finds nothing
        let warnings = EnvManager::check_env_file(temp_file.path()).unwrap().unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("DOWNLOAD_URL", "https://speed.example.net/__down").is_ok());
        assert!(EnvManager::validate_env_var("STREAM_COUNT", "6").is_ok());
        assert!(EnvManager::validate_env_var("PERCENTILE", "1").is_ok());
        assert!(EnvManager::validate_env_var("WARM_UP_MS", "1200").is_ok());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "false").is_ok());
        assert!(EnvManager::validate_env_var("UNRELATED", "anything").is_ok());

        assert!(EnvManager::validate_env_var("UPLOAD_URL", "ftp://files.example").is_err());
        assert!(EnvManager::validate_env_var("TRACE_URL", "not-a-url").is_err());
        assert!(EnvManager::validate_env_var("STREAM_COUNT", "0").is_err());
        assert!(EnvManager::validate_env_var("STREAM_COUNT", "65").is_err());
        assert!(EnvManager::validate_env_var("TEST_DURATION_MS", "0").is_err());
        assert!(EnvManager::validate_env_var("WARM_UP_MS", "0").is_err());
        assert!(EnvManager::validate_env_var("PROBE_DELAY_MS", "0").is_err());
        assert!(EnvManager::validate_env_var("TRANSITION_MS", "0").is_err());
        assert!(EnvManager::validate_env_var("PERCENTILE", "0").is_err());
        assert!(EnvManager::validate_env_var("PROBE_PENALTY_MS", "-1").is_err());
        assert!(EnvManager::validate_env_var("CONNECT_TIMEOUT_SECONDS", "301").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
    }

    #[test]
    fn test_check_env_file_reports_bad_lines() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "# comment\nSTREAM_COUNT=0\nPROBE_COUNT=4\ngarbage\n").unwrap();

        let warnings = EnvManager::check_env_file(temp_file.path()).unwrap().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("STREAM_COUNT"));

        assert!(EnvManager::check_env_file(Path::new("/nonexistent/.env")).unwrap().is_none());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();

        assert!(help.contains("Supported Environment Variables:"));
        assert!(help.contains("STREAM_COUNT"));
        assert!(help.contains("Configuration Priority"));
    }

    #[test]
    fn test_validate_current_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            std::env::remove_var(name);
        }
        assert!(EnvManager::validate_current_env().is_empty());

        std::env::set_var("PERCENTILE", "2");
        let warnings = EnvManager::validate_current_env();
        std::env::remove_var("PERCENTILE");
        assert_eq!(warnings.len(), 1);
    }
}
