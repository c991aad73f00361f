//! Structured logging system for the network speed tester
//!
//! This module provides:
//! - Structured logging with multiple levels and contexts
//! - Per-phase tagging so a run can be followed from probe to upload
//! - Phase timing through `PerformanceLogger`
//! - JSON structured output for integration with log aggregators

use crate::error::{AppError, Result};
use crate::models::{Config, LatencyEstimate, TestResult};
use crate::types::{Direction, TestPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - severe error events that cause application termination
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",    // White
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
            LogLevel::Fatal => "\x1b[35m",    // Magenta
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }

    /// Level implied by the verbosity flags
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    /// Test phase the entry was emitted in
    pub phase: Option<TestPhase>,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    current_correlation_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
///
/// Clones share their context, so a session id set on one is seen by all.
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: String) -> Self {
        Self::with_level(name, LogLevel::Info)
    }

    /// Create a plain console logger at the given level
    pub fn with_level(name: String, min_level: LogLevel) -> Self {
        Self {
            min_level,
            use_color: false,
            include_location: false,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        Self {
            min_level: LogLevel::from_flags(config.verbose, config.debug),
            use_color: config.enable_color,
            include_location: config.debug,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// A logger for a sub-component sharing this logger's settings and context
    pub fn named(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    /// Start a correlated operation
    pub async fn start_operation(&self, operation_name: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        {
            let mut context = self.context.write().await;
            context.current_correlation_id = Some(correlation_id.clone());
        }

        self.info(&format!("Started operation: {}", operation_name))
            .correlation_id(&correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "start")
            .log()
            .await;

        correlation_id
    }

    /// End a correlated operation
    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        self.info(&format!("Completed operation: {} (success: {})", operation_name, success))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "end")
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.current_correlation_id.as_deref() == Some(correlation_id) {
            context.current_correlation_id = None;
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        if entry.correlation_id.is_none() {
            entry.correlation_id = context.current_correlation_id.clone();
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
            LogFormat::Compact => self.format_compact(&entry),
        };

        // stdout carries results only
        let _ = writeln!(io::stderr(), "{}", output);
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}]", timestamp, formatted_level, entry.logger);

        if let Some(phase) = entry.phase {
            output.push_str(&format!(" <{}>", phase));
        }

        output.push(' ');
        output.push_str(&entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}", entry.message),
        }
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                phase: None,
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Tag the entry with the phase it belongs to
    pub fn phase(mut self, phase: TestPhase) -> Self {
        self.entry.phase = Some(phase);
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error", error.to_string())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        if self.logger.would_log(self.entry.level) {
            self.logger.write_entry(self.entry).await;
        }
    }
}

/// Wall-clock timing of engine phases
pub struct PerformanceLogger {
    logger: Logger,
    start_times: HashMap<TestPhase, DateTime<Utc>>,
}

impl PerformanceLogger {
    pub fn new(logger: &Logger) -> Self {
        Self {
            logger: logger.named("PERF"),
            start_times: HashMap::new(),
        }
    }

    pub async fn start_timing(&mut self, phase: TestPhase) {
        let start_time = Utc::now();
        self.start_times.insert(phase, start_time);

        self.logger
            .debug("Phase started")
            .phase(phase)
            .field("start_time", start_time)
            .log()
            .await;
    }

    /// End timing a phase and log how long it took
    pub async fn end_timing(&mut self, phase: TestPhase) -> Option<chrono::Duration> {
        let Some(start_time) = self.start_times.remove(&phase) else {
            self.logger
                .warn("Attempted to end timing for a phase that never started")
                .phase(phase)
                .log()
                .await;
            return None;
        };

        let duration = Utc::now() - start_time;
        self.logger
            .info(&format!("Phase finished in {}ms", duration.num_milliseconds()))
            .phase(phase)
            .field("duration_ms", duration.num_milliseconds())
            .log()
            .await;

        Some(duration)
    }

    /// Phases currently being timed
    pub fn active_phases(&self) -> Vec<TestPhase> {
        self.start_times.keys().copied().collect()
    }

    pub async fn log_latency(&self, estimate: &LatencyEstimate) {
        self.logger
            .info(&format!(
                "Latency {}ms, jitter {}ms",
                estimate.latency_ms, estimate.jitter_ms
            ))
            .phase(TestPhase::Ping)
            .field("latency_ms", estimate.latency_ms)
            .field("jitter_ms", estimate.jitter_ms)
            .field("probes", estimate.probes)
            .field("failed_probes", estimate.failed_probes)
            .log()
            .await;
    }

    pub async fn log_throughput(&self, direction: Direction, mbps: f64) {
        self.logger
            .info(&format!("{} throughput {:.2} Mbps", direction, mbps))
            .phase(direction.phase())
            .field("direction", direction)
            .field("mbps", mbps)
            .log()
            .await;
    }

    pub async fn log_test_result(&self, result: &TestResult) {
        self.logger
            .info("Speed test completed")
            .phase(TestPhase::Complete)
            .field("server_id", result.server_id())
            .field("download_mbps", result.download_mbps())
            .field("upload_mbps", result.upload_mbps())
            .field("latency_ms", result.latency_ms())
            .field("jitter_ms", result.jitter_ms())
            .log()
            .await;
    }
}

/// Specialized logger for network operations
#[derive(Debug, Clone)]
pub struct NetworkLogger {
    logger: Logger,
}

impl NetworkLogger {
    pub fn new(logger: &Logger) -> Self {
        Self {
            logger: logger.named("NET"),
        }
    }

    /// Log one latency probe outcome
    pub async fn log_probe(&self, url: &str, rtt_ms: Option<f64>, error: Option<&AppError>) {
        let mut builder = match rtt_ms {
            Some(rtt) => self
                .logger
                .debug(&format!("Probe answered in {:.1}ms", rtt))
                .field("rtt_ms", rtt),
            None => self.logger.debug("Probe failed"),
        };
        builder = builder.field("url", url).field("success", rtt_ms.is_some());

        if let Some(error) = error {
            builder = builder.error_info(error);
        }

        builder.log().await;
    }

    /// Log a failed transfer attempt that the worker is about to restart
    pub async fn log_request_failure(&self, direction: Direction, worker: usize, error: &AppError) {
        self.logger
            .debug(&format!("{} stream {} restarting after failure", direction, worker))
            .phase(direction.phase())
            .field("worker", worker)
            .error_info(error)
            .log()
            .await;
    }

    /// Log the per-worker totals at the end of a phase
    pub async fn log_stream_summary(&self, direction: Direction, worker: usize, attempts: u64, failures: u64, bytes: u64) {
        let level = if attempts > 0 && failures == attempts {
            LogLevel::Warn
        } else {
            LogLevel::Debug
        };

        self.logger
            .log(level, &format!("{} stream {} finished", direction, worker))
            .phase(direction.phase())
            .field("worker", worker)
            .field("attempts", attempts)
            .field("failures", failures)
            .field("bytes", bytes)
            .log()
            .await;
    }
}

/// Global logger factory and management
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name tagged with this session
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Convenience macros for logging with location information
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn entry(phase: Option<TestPhase>) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message: "Test message".to_string(),
            logger: "TEST".to_string(),
            correlation_id: Some("0123456789abcdef".to_string()),
            phase,
            fields: {
                let mut map = HashMap::new();
                map.insert("key".to_string(), serde_json::Value::String("value".to_string()));
                map
            },
            location: None,
        }
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert!(LogLevel::from_str("invalid").is_err());
    }

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Warn);
        assert_eq!(LogLevel::from_flags(true, false), LogLevel::Info);
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Debug);
    }

    #[test]
    fn test_logger_with_config() {
        let config = Config {
            debug: true,
            enable_color: false,
            ..Default::default()
        };

        let logger = Logger::with_config("TEST".to_string(), &config);
        assert_eq!(logger.min_level, LogLevel::Debug);
        assert_eq!(logger.format, LogFormat::Json);
        assert!(!logger.use_color);
        assert!(logger.include_location);
    }

    #[tokio::test]
    async fn test_named_logger_shares_context() {
        let root = Logger::with_level("ENGINE".to_string(), LogLevel::Warn);
        let child = root.named("PROBE");
        root.set_session_id("session-1".to_string()).await;

        assert_eq!(child.name(), "PROBE");
        assert_eq!(child.min_level, LogLevel::Warn);
        let context = child.context.read().await;
        assert_eq!(context.session_id.as_deref(), Some("session-1"));
    }

    #[tokio::test]
    async fn test_operation_correlation() {
        let logger = Logger::with_level("TEST".to_string(), LogLevel::Fatal);
        let correlation_id = logger.start_operation("speed_test").await;
        assert_eq!(
            logger.context.read().await.current_correlation_id.as_deref(),
            Some(correlation_id.as_str())
        );

        logger.end_operation(&correlation_id, "speed_test", true).await;
        assert!(logger.context.read().await.current_correlation_id.is_none());
    }

    #[test]
    fn test_would_log() {
        let logger = Logger::with_level("TEST".to_string(), LogLevel::Warn);

        assert!(!logger.would_log(LogLevel::Debug));
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Warn));
        assert!(logger.would_log(LogLevel::Fatal));
    }

    #[test]
    fn test_console_format_includes_phase() {
        let logger = Logger::new("TEST".to_string());
        let output = logger.format_console(&entry(Some(TestPhase::Download)));
        assert!(output.contains(" INFO [TEST] <DOWNLOAD> Test message"));
        assert!(output.contains("[01234567]"));
        assert!(output.contains("key=\"value\""));
    }

    #[test]
    fn test_json_and_compact_formats() {
        let logger = Logger::new("TEST".to_string());
        let json: serde_json::Value = serde_json::from_str(&logger.format_json(&entry(Some(TestPhase::Ping)))).unwrap();
        assert_eq!(json["phase"], "Ping");
        assert_eq!(json["level"], "Info");

        let compact = logger.format_compact(&entry(None));
        assert!(compact.contains(" I TEST: Test message"));
    }

    #[tokio::test]
    async fn test_performance_timing() {
        let logger = Logger::with_level("TEST".to_string(), LogLevel::Fatal);
        let mut perf_logger = PerformanceLogger::new(&logger);

        perf_logger.start_timing(TestPhase::Download).await;
        assert_eq!(perf_logger.active_phases(), vec![TestPhase::Download]);

        let duration = perf_logger.end_timing(TestPhase::Download).await;
        assert!(duration.unwrap().num_milliseconds() >= 0);
        assert!(perf_logger.active_phases().is_empty());

        assert!(perf_logger.end_timing(TestPhase::Upload).await.is_none());
    }

    #[tokio::test]
    async fn test_network_logging() {
        let logger = Logger::with_level("TEST".to_string(), LogLevel::Trace);
        let net_logger = NetworkLogger::new(&logger);
        let error = AppError::network("connection refused");

        net_logger.log_probe("https://example.com/cdn-cgi/trace", Some(21.4), None).await;
        net_logger.log_probe("https://example.com/cdn-cgi/trace", None, Some(&error)).await;
        net_logger.log_request_failure(Direction::Download, 3, &error).await;
        net_logger.log_stream_summary(Direction::Upload, 0, 4, 4, 0).await;
    }

    #[tokio::test]
    async fn test_context_fields_are_shared_with_children() {
        let root = Logger::with_level("nst".to_string(), LogLevel::Fatal);
        let engine = root.named("ENGINE");
        root.add_context_field("server_id".to_string(), "cloudflare").await;

        let context = engine.context.read().await;
        assert_eq!(context.context_fields["server_id"], "cloudflare");
    }

    #[tokio::test]
    async fn test_logger_factory() {
        let factory = LoggerFactory::new(Config::default());
        let logger = factory.create_logger("MAIN").await;
        assert_eq!(logger.name(), "MAIN");
        assert_eq!(
            logger.context.read().await.session_id.as_deref(),
            Some(factory.session_id())
        );
    }

    #[test]
    fn test_log_entry_serialization() {
        let json = serde_json::to_string(&entry(Some(TestPhase::Upload))).unwrap();
        let deserialized: LogEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.level, LogLevel::Info);
        assert_eq!(deserialized.phase, Some(TestPhase::Upload));
        assert_eq!(deserialized.logger, "TEST");
    }
}
