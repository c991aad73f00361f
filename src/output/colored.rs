//! Colored formatter implementation with terminal color support

use super::formatter::{fmt_error, format_speed, progress_bar, FormattingOptions, OutputFormatter};
use crate::{
    engine::LiveGauge,
    error::Result,
    models::{HealthReading, LatencyEstimate, TestResult},
    types::TestPhase,
};
use colored::*;
use std::fmt::Write as _;

/// Latency classification for color coding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    Excellent,  // < 20ms
    Good,       // 20-50ms
    Fair,       // 50-100ms
    Poor,       // 100-300ms
    VeryPoor,   // >= 300ms
}

impl PerformanceLevel {
    pub fn from_latency(latency_ms: u32) -> Self {
        match latency_ms {
            0..=19 => Self::Excellent,
            20..=49 => Self::Good,
            50..=99 => Self::Fair,
            100..=299 => Self::Poor,
            _ => Self::VeryPoor,
        }
    }

    /// Classify a rate; thresholds follow common broadband tiers
    pub fn from_speed(mbps: f64) -> Self {
        if mbps >= 500.0 {
            Self::Excellent
        } else if mbps >= 100.0 {
            Self::Good
        } else if mbps >= 25.0 {
            Self::Fair
        } else if mbps >= 5.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub warning: Color,
    pub error: Color,
    pub muted: Color,
    pub download: Color,
    pub upload: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            warning: Color::Yellow,
            error: Color::Red,
            muted: Color::BrightBlack,
            download: Color::Cyan,
            upload: Color::Magenta,
        }
    }
}

pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn speed(&self, mbps: f64) -> ColoredString {
        let level = PerformanceLevel::from_speed(mbps);
        self.colorize(&format_speed(mbps), level.color())
    }

    fn phase_color(&self, phase: TestPhase) -> Color {
        match phase {
            TestPhase::Download => self.color_scheme.download,
            TestPhase::Upload => self.color_scheme.upload,
            _ => self.color_scheme.muted,
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.header)).map_err(fmt_error)?;
        writeln!(output, "  {}  ", self.bold(title)).map_err(fmt_error)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.header)).map_err(fmt_error)?;

        Ok(output)
    }

    fn format_result(&self, result: &TestResult, server_name: &str) -> Result<String> {
        let mut output = String::new();
        let latency_level = PerformanceLevel::from_latency(result.latency_ms());

        writeln!(
            output,
            "{} {} {}",
            self.bold("Server  "),
            server_name,
            self.colorize(&format!("({})", result.server_id()), self.color_scheme.muted)
        )
        .map_err(fmt_error)?;
        writeln!(
            output,
            "{} {} {}",
            self.bold("Latency "),
            self.colorize(&format!("{} ms", result.latency_ms()), latency_level.color()),
            self.colorize(&format!("[{}]", latency_level.description()), self.color_scheme.muted)
        )
        .map_err(fmt_error)?;
        writeln!(output, "{} {} ms", self.bold("Jitter  "), result.jitter_ms()).map_err(fmt_error)?;
        writeln!(output, "{} {}", self.bold("Download"), self.speed(result.download_mbps())).map_err(fmt_error)?;
        write!(output, "{} {}", self.bold("Upload  "), self.speed(result.upload_mbps())).map_err(fmt_error)?;

        if self.options.verbose_mode {
            write!(
                output,
                "\n{}",
                self.colorize(
                    &format!("Measured {}", result.produced_at().to_rfc3339()),
                    self.color_scheme.muted
                )
            )
            .map_err(fmt_error)?;
        }

        Ok(output)
    }

    fn format_latency(&self, estimate: &LatencyEstimate) -> Result<String> {
        let level = PerformanceLevel::from_latency(estimate.latency_ms);
        let mut line = format!(
            "Latency {} jitter {} ms",
            self.colorize(&format!("{} ms,", estimate.latency_ms), level.color()),
            estimate.jitter_ms
        );
        if estimate.failed_probes > 0 {
            let note = format!(" ({} of {} probes failed)", estimate.failed_probes, estimate.probes);
            write!(line, "{}", self.colorize(&note, self.color_scheme.warning)).map_err(fmt_error)?;
        }
        Ok(line)
    }

    fn format_progress(&self, gauge: &LiveGauge) -> String {
        let color = self.phase_color(gauge.phase);
        format!(
            "{} {} {:>5.1}%  {}",
            self.colorize(&format!("{:<10}", gauge.phase.as_str()), color),
            self.colorize(&progress_bar(gauge.percent, self.options.bar_width), color),
            gauge.percent,
            self.bold(&format_speed(gauge.mbps))
        )
    }

    fn format_health(&self, reading: &HealthReading) -> Result<String> {
        let time = self.colorize(&reading.measured_at.format("%H:%M:%S").to_string(), self.color_scheme.muted);
        Ok(match reading.latency_ms {
            Some(ms) => {
                let level = PerformanceLevel::from_latency(ms);
                format!("{} {} {}", time, self.colorize("●", level.color()), self.colorize(&format!("{} ms", ms), level.color()))
            }
            None => format!("{} {}", time, self.colorize("● unreachable", self.color_scheme.error)),
        })
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✗ ERROR:", self.color_scheme.error).bold(), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("⚠ WARNING:", self.color_scheme.warning), warning))
    }
}
