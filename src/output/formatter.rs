//! Core formatting trait with plain text and JSON implementations

use crate::{
    engine::LiveGauge,
    error::{AppError, Result},
    models::{HealthReading, LatencyEstimate, TestResult},
};
use serde::Serialize;
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the final result of a run against `server_name`
    fn format_result(&self, result: &TestResult, server_name: &str) -> Result<String>;

    /// Format the latency stage as soon as it finishes
    fn format_latency(&self, estimate: &LatencyEstimate) -> Result<String>;

    /// Single line for a live speed dial, redrawn in place
    fn format_progress(&self, gauge: &LiveGauge) -> String;

    /// Format one idle health reading
    fn format_health(&self, reading: &HealthReading) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Whether live progress lines should be drawn at all
    fn shows_progress(&self) -> bool {
        true
    }
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show probe and sample detail
    pub verbose_mode: bool,
    /// Width of the progress bar in characters
    pub bar_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            bar_width: 30,
        }
    }
}

pub(crate) fn fmt_error(error: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", error))
}

/// Human readable rate, switching to Gbps above 1000 Mbps
pub fn format_speed(mbps: f64) -> String {
    if !mbps.is_finite() || mbps <= 0.0 {
        "0.00 Mbps".to_string()
    } else if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else if mbps >= 100.0 {
        format!("{:.0} Mbps", mbps)
    } else if mbps >= 10.0 {
        format!("{:.1} Mbps", mbps)
    } else {
        format!("{:.2} Mbps", mbps)
    }
}

pub(crate) fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled.min(width)))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_error)?;
        writeln!(output, "  {}  ", title).map_err(fmt_error)?;
        write!(output, "{}", border).map_err(fmt_error)?;

        Ok(output)
    }

    fn format_result(&self, result: &TestResult, server_name: &str) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Server:    {} ({})", server_name, result.server_id()).map_err(fmt_error)?;
        writeln!(output, "Latency:   {} ms", result.latency_ms()).map_err(fmt_error)?;
        writeln!(output, "Jitter:    {} ms", result.jitter_ms()).map_err(fmt_error)?;
        writeln!(output, "Download:  {}", format_speed(result.download_mbps())).map_err(fmt_error)?;
        write!(output, "Upload:    {}", format_speed(result.upload_mbps())).map_err(fmt_error)?;

        if self.options.verbose_mode {
            write!(output, "\nMeasured:  {}", result.produced_at().to_rfc3339()).map_err(fmt_error)?;
        }

        Ok(output)
    }

    fn format_latency(&self, estimate: &LatencyEstimate) -> Result<String> {
        let mut line = format!("Latency {} ms, jitter {} ms", estimate.latency_ms, estimate.jitter_ms);
        if estimate.failed_probes > 0 {
            write!(line, " ({} of {} probes failed)", estimate.failed_probes, estimate.probes).map_err(fmt_error)?;
        }
        Ok(line)
    }

    fn format_progress(&self, gauge: &LiveGauge) -> String {
        format!(
            "{:<10} {} {:>5.1}%  {}",
            gauge.phase.as_str(),
            progress_bar(gauge.percent, self.options.bar_width),
            gauge.percent,
            format_speed(gauge.mbps)
        )
    }

    fn format_health(&self, reading: &HealthReading) -> Result<String> {
        let time = reading.measured_at.format("%H:%M:%S");
        Ok(match reading.latency_ms {
            Some(ms) => format!("{} reachable, {} ms", time, ms),
            None => format!("{} unreachable", time),
        })
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }
}

#[derive(Serialize)]
struct ResultReport<'a> {
    server_name: &'a str,
    #[serde(flatten)]
    result: &'a TestResult,
}

/// Machine readable output, one JSON document per call
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(rendered)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_header(&self, _title: &str) -> Result<String> {
        Ok(String::new())
    }

    fn format_result(&self, result: &TestResult, server_name: &str) -> Result<String> {
        self.render(&ResultReport { server_name, result })
    }

    fn format_latency(&self, estimate: &LatencyEstimate) -> Result<String> {
        self.render(estimate)
    }

    fn format_progress(&self, gauge: &LiveGauge) -> String {
        serde_json::to_string(gauge).unwrap_or_default()
    }

    fn format_health(&self, reading: &HealthReading) -> Result<String> {
        serde_json::to_string(reading).map_err(AppError::from)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        self.render(&serde_json::json!({ "error": error }))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        self.render(&serde_json::json!({ "warning": warning }))
    }

    fn shows_progress(&self) -> bool {
        false
    }
}
