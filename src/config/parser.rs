//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::{Config, ServerEndpoint},
};

/// Bytes requested per download stream when URLs are derived from `--server`
const SERVER_DOWNLOAD_BYTES: u64 = 100_000_000;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    ///
    /// Priority, lowest first: defaults, `.env`, process environment, CLI.
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config)?;

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        let cli = &self.cli;

        if let Some(ref base) = cli.server {
            let id = cli.server_id.clone().unwrap_or_else(|| "custom".to_string());
            let endpoint = ServerEndpoint::from_base(id, base, SERVER_DOWNLOAD_BYTES)
                .map_err(|e| AppError::config(format!("Invalid --server '{}': {}", base, e)))?;
            config.server_id = endpoint.id;
            config.server_name = endpoint.name;
            config.download_url = endpoint.download_url;
            config.upload_url = endpoint.upload_url;
            config.trace_url = endpoint.trace_url;
        }

        override_with(&mut config.server_id, &cli.server_id);
        override_with(&mut config.server_name, &cli.server_name);
        override_with(&mut config.download_url, &cli.download_url);
        override_with(&mut config.upload_url, &cli.upload_url);
        override_with(&mut config.trace_url, &cli.trace_url);

        override_with(&mut config.duration_ms, &cli.duration);
        override_with(&mut config.stream_count, &cli.streams);
        override_with(&mut config.warm_up_ms, &cli.warm_up);
        override_with(&mut config.sample_interval_ms, &cli.sample_interval);
        override_with(&mut config.probe_count, &cli.probes);
        override_with(&mut config.probe_delay_ms, &cli.probe_delay);
        override_with(&mut config.probe_timeout_ms, &cli.probe_timeout);
        override_with(&mut config.probe_penalty_ms, &cli.probe_penalty);
        override_with(&mut config.transition_ms, &cli.transition);
        override_with(&mut config.percentile, &cli.percentile);
        override_with(&mut config.upload_payload_bytes, &cli.upload_bytes);
        override_with(&mut config.health_interval_ms, &cli.health_interval);
        override_with(&mut config.connect_timeout_seconds, &cli.connect_timeout);

        if cli.color {
            config.enable_color = true;
        }
        if cli.no_color || cli.json {
            config.enable_color = false;
        }

        // CLI-only flags
        config.verbose = cli.verbose;
        config.debug = cli.debug;
        config.json = cli.json;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }

        Ok(())
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let summary = [
        format!("Server: {} ({})", config.server_name, config.server_id),
        format!("Download URL: {}", config.download_url),
        format!("Upload URL: {}", config.upload_url),
        format!("Trace URL: {}", config.trace_url),
        format!(
            "Phase: {}ms, {} streams, warm-up {}ms, sampled every {}ms",
            config.duration_ms, config.stream_count, config.warm_up_ms, config.sample_interval_ms
        ),
        format!(
            "Probes: {} x {}ms apart, timeout {}ms, penalty {}ms",
            config.probe_count, config.probe_delay_ms, config.probe_timeout_ms, config.probe_penalty_ms
        ),
        format!("Percentile: {}", config.percentile),
        format!("Upload payload: {} bytes", config.upload_payload_bytes),
        format!("Connect timeout: {}s", config.connect_timeout_seconds),
        format!("Color Output: {}", config.enable_color),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ];

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_LOCK;
    use clap::Parser;
    use std::env;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["nst"];
        argv.extend_from_slice(args);
        ConfigParser::new(Cli::parse_from(argv)).parse()
    }

    fn clear_env() {
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = parse(&["--duration", "4000", "--streams", "3", "--no-color", "--verbose"]).unwrap();

        assert_eq!(config.duration_ms, 4000);
        assert_eq!(config.stream_count, 3);
        assert_eq!(config.warm_up_ms, crate::defaults::DEFAULT_WARM_UP_MS);
        assert!(!config.enable_color);
        assert!(config.verbose);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("STREAM_COUNT", "8");
        env::set_var("PROBE_COUNT", "3");

        let config = parse(&["--streams", "12"]);
        clear_env();
        let config = config.unwrap();

        assert_eq!(config.stream_count, 12);
        assert_eq!(config.probe_count, 3);
    }

    #[test]
    fn test_server_base_derives_urls() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = parse(&["--server", "https://speed.example.net/", "--server-id", "example"]).unwrap();

        assert_eq!(config.server_id, "example");
        assert_eq!(config.download_url, "https://speed.example.net/__down?bytes=100000000");
        assert_eq!(config.upload_url, "https://speed.example.net/__up");
        assert_eq!(config.trace_url, "https://speed.example.net/cdn-cgi/trace");
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let error = parse(&["--streams", "0"]).unwrap_err();
        assert_eq!(error.category(), "CONFIG");
        assert_eq!(error.exit_code(), 1);

        assert!(parse(&["--percentile", "1.5"]).is_err());
        assert!(parse(&["--download-url", "ftp://files.example/blob"]).is_err());
        assert!(parse(&["--server", "not a url"]).is_err());
    }

    #[test]
    fn test_json_disables_color() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = parse(&["--json"]).unwrap();
        assert!(config.json);
        assert!(!config.enable_color);
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());

        assert!(summary.contains("Server: Cloudflare (cloudflare)"));
        assert!(summary.contains("6 streams"));
        assert!(summary.contains("Percentile: 0.8"));
    }
}
