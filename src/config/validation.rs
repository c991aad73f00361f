//! Advisory checks on a configuration that already passed hard validation

use crate::{error::Result, models::Config};
use colored::*;

/// Stream count above which a warning about host-side contention is raised
const HIGH_STREAM_COUNT: u32 = 16;

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run `Config::validate` and then collect non-fatal warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_endpoint_urls(config));
        warnings.extend(Self::validate_phase_settings(config));
        warnings.extend(Self::validate_probe_settings(config));
        Ok(warnings)
    }

    fn validate_endpoint_urls(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let urls = [
            ("download", &config.download_url),
            ("upload", &config.upload_url),
            ("trace", &config.trace_url),
        ];

        for (role, url) in urls {
            let Ok(parsed) = url::Url::parse(url) else {
                continue;
            };

            if parsed.scheme() == "http" {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("The {} URL '{}' uses HTTP; proxies on the path may cache or compress it", role, url),
                ));
            }

            let local = match parsed.host() {
                Some(url::Host::Ipv4(ip)) => ip.is_private() || ip.is_loopback(),
                Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
                Some(url::Host::Domain(host)) => host == "localhost",
                None => false,
            };
            if local {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("The {} URL targets a local network; results will not reflect the internet link", role),
                ));
            }
        }

        warnings
    }

    fn validate_phase_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.warm_up_ms >= config.duration_ms {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Warm-up of {}ms covers the whole {}ms phase; throughput will be reported as 0",
                    config.warm_up_ms, config.duration_ms
                ),
            ));
        }

        if config.sample_interval_ms.saturating_mul(10) > config.duration_ms {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Sampling every {}ms yields fewer than 10 samples per {}ms phase",
                    config.sample_interval_ms, config.duration_ms
                ),
            ));
        }

        if config.stream_count > HIGH_STREAM_COUNT {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "{} concurrent streams may be limited by this host rather than the link",
                    config.stream_count
                ),
            ));
        }

        warnings
    }

    fn validate_probe_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.probe_count < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "{} probe(s) leave nothing after trimming the extremes (recommended: >= 3)",
                    config.probe_count
                ),
            ));
        }

        if config.probe_penalty_ms < config.probe_timeout_ms as f64 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Probe penalty {}ms is below the {}ms timeout, so failed probes may look faster than slow ones",
                    config.probe_penalty_ms, config.probe_timeout_ms
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Info => Color::Blue,
            Self::Warning => Color::Yellow,
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
