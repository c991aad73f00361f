//! Sequential latency probing

use crate::client::HttpClient;
use crate::error::{AppError, Result};
use crate::logging::{LogLevel, Logger, NetworkLogger};
use crate::models::{LatencyEstimate, ServerEndpoint, TestConfig};
use crate::stats;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

/// Times small requests against an endpoint's trace URL
#[derive(Clone)]
pub struct ProbeSampler {
    client: Arc<dyn HttpClient>,
    timeout: Duration,
    penalty_ms: f64,
    logger: NetworkLogger,
}

impl ProbeSampler {
    pub fn new(client: Arc<dyn HttpClient>, timeout: Duration, penalty_ms: f64) -> Self {
        Self {
            client,
            timeout,
            penalty_ms,
            logger: NetworkLogger::new(&Logger::with_level("PROBE".to_string(), LogLevel::Warn)),
        }
    }

    pub fn from_config(client: Arc<dyn HttpClient>, config: &TestConfig) -> Self {
        Self::new(client, config.probe_timeout(), config.probe_penalty_ms)
    }

    pub fn with_logger(mut self, logger: &Logger) -> Self {
        self.logger = NetworkLogger::new(logger);
        self
    }

    /// One timed request, in milliseconds from send to response headers
    ///
    /// Any HTTP status counts. Transport errors and timeouts yield None.
    pub async fn probe_once(&self, url: &str) -> Option<f64> {
        let started = Instant::now();

        let error = match timeout(self.timeout, self.client.probe(url)).await {
            Ok(Ok(_status)) => {
                let rtt = started.elapsed().as_secs_f64() * 1000.0;
                self.logger.log_probe(url, Some(rtt), None).await;
                return Some(rtt);
            }
            Ok(Err(error)) => error,
            Err(_) => AppError::timeout(format!("no response within {}ms", self.timeout.as_millis())),
        };

        self.logger.log_probe(url, None, Some(&error)).await;
        None
    }

    /// Probe `endpoint` `count` times in sequence and reduce to latency and jitter
    ///
    /// Failed probes are recorded at the penalty value instead of aborting.
    /// Consecutive probes are separated by `delay`.
    pub async fn measure(
        &self,
        endpoint: &ServerEndpoint,
        count: u32,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<LatencyEstimate> {
        let mut rtts = Vec::with_capacity(count as usize);
        let mut failed = 0u32;

        for index in 0..count {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AppError::cancelled("latency probing was cancelled")),
                    _ = sleep(delay) => {}
                }
            }

            let rtt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::cancelled("latency probing was cancelled")),
                rtt = self.probe_once(&endpoint.trace_url) => rtt,
            };

            match rtt {
                Some(rtt) => rtts.push(rtt),
                None => {
                    failed += 1;
                    rtts.push(self.penalty_ms);
                }
            }
        }

        Ok(stats::latency_estimate(&rtts, failed))
    }
}
