//! Multi-stream throughput measurement
//!
//! A phase runs `stream_count` workers against one deadline. Workers add to a
//! shared byte counter; the tester samples that counter on a fixed cadence
//! and reduces the samples past the warm-up window to a single figure.

pub mod aggregator;
pub mod worker;

pub use aggregator::SampleAggregator;
pub use worker::{generate_payload, ByteCounter, ThroughputWorker, Transfer, WorkerReport};

use crate::client::HttpClient;
use crate::engine::EngineContext;
use crate::error::{AppError, Result};
use crate::logging::{LogLevel, Logger, NetworkLogger};
use crate::models::{ServerEndpoint, TestConfig};
use crate::types::Direction;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Runs one throughput phase at a time for a fixed set of parameters
pub struct ThroughputTester {
    client: Arc<dyn HttpClient>,
    config: TestConfig,
    context: Option<Arc<EngineContext>>,
    logger: Logger,
}

impl ThroughputTester {
    pub fn new(client: Arc<dyn HttpClient>, config: TestConfig) -> Self {
        Self {
            client,
            config,
            context: None,
            logger: Logger::with_level("THROUGHPUT".to_string(), LogLevel::Warn),
        }
    }

    /// Publish progress of every sample tick through `context`
    pub fn with_context(mut self, context: Arc<EngineContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_logger(mut self, logger: &Logger) -> Self {
        self.logger = logger.named("THROUGHPUT");
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Measure one direction against `endpoint` and return the reduced rate in Mbps
    ///
    /// A phase in which no bytes moved yields `Ok(0.0)`. Firing `cancel`
    /// stops the phase early with a `Cancelled` error; every worker has been
    /// joined by the time this returns either way.
    pub async fn run(&self, direction: Direction, endpoint: &ServerEndpoint, cancel: &CancellationToken) -> Result<f64> {
        self.config.validate()?;

        let phase = direction.phase();
        let duration = self.config.duration();
        let cadence = self.config.sample_interval();
        let stream_count = self.config.stream_count as usize;

        let phase_token = cancel.child_token();
        let counter = ByteCounter::new();
        let mut aggregator = SampleAggregator::new(self.config.warm_up_ms, self.config.percentile);

        let (transfer, url) = match direction {
            Direction::Download => (Transfer::Download, endpoint.download_url.clone()),
            Direction::Upload => (
                Transfer::Upload(generate_payload(self.config.upload_payload_bytes)),
                endpoint.upload_url.clone(),
            ),
        };

        self.logger
            .debug(&format!("Starting {} streams", stream_count))
            .phase(phase)
            .field("url", &url)
            .field("duration_ms", self.config.duration_ms)
            .log()
            .await;

        let start = Instant::now();
        let deadline = start + duration;
        let network_logger = NetworkLogger::new(&self.logger);

        let mut workers = JoinSet::new();
        for id in 0..stream_count {
            let worker = ThroughputWorker::new(
                id,
                transfer.clone(),
                url.clone(),
                self.client.clone(),
                network_logger.clone(),
            );
            workers.spawn(worker.run(deadline, counter.clone(), phase_token.clone()));
        }

        let mut ticker = interval_at(start + cadence, cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let cancelled = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break true,
                _ = ticker.tick() => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    self.record_tick(&mut aggregator, elapsed_ms, counter.total(), direction);
                    if elapsed_ms >= self.config.duration_ms {
                        break false;
                    }
                }
                _ = sleep_until(deadline) => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    self.record_tick(&mut aggregator, elapsed_ms, counter.total(), direction);
                    break false;
                }
            }
        };

        phase_token.cancel();

        let mut lost_workers = 0usize;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => {
                    network_logger
                        .log_stream_summary(direction, report.worker, report.attempts, report.failures, report.bytes)
                        .await;
                }
                Err(error) => {
                    lost_workers += 1;
                    self.logger
                        .error(&format!("{} stream task failed: {}", direction, error))
                        .phase(phase)
                        .field("panic", error.is_panic())
                        .log()
                        .await;
                }
            }
        }

        if cancelled {
            return Err(AppError::cancelled(format!("{} phase was cancelled", direction)));
        }

        if lost_workers == stream_count {
            return Err(AppError::test_execution(format!(
                "every {} stream terminated unexpectedly",
                direction
            )));
        }

        let mbps = aggregator.reduce();
        self.logger
            .info(&format!("{} reduced to {:.2} Mbps", direction, mbps))
            .phase(phase)
            .field("retained_samples", aggregator.retained().len())
            .field("ticks", aggregator.ticks())
            .field("total_bytes", counter.total())
            .log()
            .await;

        Ok(mbps)
    }

    fn record_tick(&self, aggregator: &mut SampleAggregator, elapsed_ms: u64, total_bytes: u64, direction: Direction) {
        let Some(sample) = aggregator.tick(elapsed_ms, total_bytes) else {
            return;
        };

        if let Some(context) = &self.context {
            let percent = (elapsed_ms as f64 / self.config.duration_ms as f64 * 100.0).min(100.0);
            context.publish_progress(direction.phase(), percent, sample.mbps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{DownloadMode, MockClient, UploadMode};
    use crate::engine::EngineEvent;
    use crate::types::TestPhase;
    use std::time::Duration;

    fn endpoint() -> ServerEndpoint {
        ServerEndpoint::new(
            "mock",
            "Mock",
            "http://mock/__down?bytes=100000000",
            "http://mock/__up",
            "http://mock/cdn-cgi/trace",
        )
    }

    fn quick_config(duration_ms: u64, streams: u32) -> TestConfig {
        TestConfig {
            duration_ms,
            stream_count: streams,
            upload_payload_bytes: 10_000,
            ..TestConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_stream_steady_rate() {
        // 10 MB/s: 100 KB every 10 ms
        let client = Arc::new(MockClient::new().with_download(DownloadMode::Stream {
            chunk_bytes: 100_000,
            interval: Duration::from_millis(10),
            chunks: None,
        }));
        let tester = ThroughputTester::new(client, quick_config(5000, 1));

        let mbps = tester
            .run(Direction::Download, &endpoint(), &CancellationToken::new())
            .await
            .unwrap();

        assert!((mbps - 80.0).abs() < 2.0, "got {} Mbps", mbps);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_run_concurrently() {
        let client = Arc::new(MockClient::new());
        let tester = ThroughputTester::new(client.clone(), quick_config(2000, 6));

        let mbps = tester
            .run(Direction::Download, &endpoint(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.max_active_streams(), 6);
        assert_eq!(client.active_streams(), 0);
        // Six streams of 1 KB per 10 ms are 4.8 Mbps together
        assert!((mbps - 4.8).abs() < 0.2, "got {} Mbps", mbps);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_streams_failing_yields_zero() {
        let client = Arc::new(MockClient::new().with_download(DownloadMode::Fail));
        let tester = ThroughputTester::new(client.clone(), quick_config(2000, 4));

        let started = Instant::now();
        let mbps = tester
            .run(Direction::Download, &endpoint(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(mbps, 0.0);
        assert!(started.elapsed() <= Duration::from_millis(2100));
        assert!(client.downloads() > 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_counts_completed_sends() {
        let client = Arc::new(MockClient::new().with_upload(UploadMode::Accept(Duration::from_millis(10))));
        let tester = ThroughputTester::new(client.clone(), quick_config(3000, 2));

        let mbps = tester
            .run(Direction::Upload, &endpoint(), &CancellationToken::new())
            .await
            .unwrap();

        // Two streams, 10 KB every 10 ms each: 16 Mbps
        assert!((mbps - 16.0).abs() < 0.5, "got {} Mbps", mbps);
        assert!(client.seen_urls().iter().all(|url| url == "http://mock/__up"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_joins_workers_and_errors() {
        let client = Arc::new(MockClient::new());
        let tester = Arc::new(ThroughputTester::new(client.clone(), quick_config(10_000, 3)));
        let cancel = CancellationToken::new();

        let handle = {
            let tester = tester.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { tester.run(Direction::Download, &endpoint(), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        let error = handle.await.unwrap().unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(client.active_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_worker_panicking_is_an_error() {
        let client = Arc::new(MockClient::new().with_download(DownloadMode::Panic));
        let tester = ThroughputTester::new(client, quick_config(1000, 2));

        let error = tester
            .run(Direction::Download, &endpoint(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.category(), "TEST");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_rejected_before_spawning() {
        let client = Arc::new(MockClient::new());
        let tester = ThroughputTester::new(client.clone(), quick_config(1000, 0));

        assert!(tester
            .run(Direction::Download, &endpoint(), &CancellationToken::new())
            .await
            .is_err());
        assert_eq!(client.downloads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_published_per_tick() {
        let context = Arc::new(EngineContext::new());
        let mut events = context.subscribe();
        let client = Arc::new(MockClient::new());
        let config = TestConfig {
            sample_interval_ms: 100,
            ..quick_config(1000, 1)
        };
        let tester = ThroughputTester::new(client, config).with_context(context.clone());

        tester
            .run(Direction::Download, &endpoint(), &CancellationToken::new())
            .await
            .unwrap();

        let mut percents = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::Progress { phase, percent, .. } = event {
                assert_eq!(phase, TestPhase::Download);
                percents.push(percent.round() as u32);
            }
        }
        assert_eq!(percents, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert_eq!(context.gauge().percent.round() as u32, 100);
    }
}
