//! Output formatting and display system
//!
//! Final results, live progress lines and health readings are rendered by an
//! [`OutputFormatter`]: plain text, colored terminal output, or JSON.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{format_speed, FormattingOptions, JsonFormatter, OutputFormatter, PlainFormatter};

use crate::models::Config;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter + Send + Sync> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Pick the formatter a resolved configuration asks for
    pub fn from_config(config: &Config) -> Box<dyn OutputFormatter + Send + Sync> {
        if config.json {
            Box::new(JsonFormatter::new(true))
        } else {
            Self::create_formatter(config.enable_color, config.verbose)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_flag_wins_over_color() {
        let config = Config {
            json: true,
            enable_color: true,
            ..Config::default()
        };
        assert!(!OutputFormatterFactory::from_config(&config).shows_progress());

        let config = Config {
            json: false,
            ..config
        };
        assert!(OutputFormatterFactory::from_config(&config).shows_progress());
    }
}
