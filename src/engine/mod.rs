//! Speed test phase state machine
//!
//! A run walks `PING -> DOWNLOAD -> TRANSITION -> UPLOAD -> COMPLETE`. Any
//! failure that prevents a result sends the machine back to `IDLE` and
//! publishes `Aborted`; a finished run leaves it at `COMPLETE`. Both resting
//! phases accept a new `start`.

pub mod events;

pub use events::{EngineContext, EngineEvent, LiveGauge};

use crate::client::HttpClient;
use crate::error::{AppError, Result};
use crate::logging::{LogLevel, Logger, PerformanceLogger};
use crate::models::{ServerEndpoint, TestConfig, TestResult};
use crate::monitor::LiveHealthMonitor;
use crate::probe::ProbeSampler;
use crate::throughput::ThroughputTester;
use crate::types::{Direction, TestPhase};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub struct PhaseStateMachine {
    client: Arc<dyn HttpClient>,
    config: TestConfig,
    context: Arc<EngineContext>,
    logger: Logger,
    monitor: Mutex<Option<Arc<LiveHealthMonitor>>>,
    run_token: Mutex<Option<CancellationToken>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl PhaseStateMachine {
    pub fn new(client: Arc<dyn HttpClient>, config: TestConfig) -> Self {
        Self {
            client,
            config,
            context: Arc::new(EngineContext::new()),
            logger: Logger::with_level("ENGINE".to_string(), LogLevel::Warn),
            monitor: Mutex::new(None),
            run_token: Mutex::new(None),
        }
    }

    pub fn with_logger(mut self, logger: &Logger) -> Self {
        self.logger = logger.named("ENGINE");
        self
    }

    /// Suspend `monitor` whenever a run leaves rest and resume it on return
    pub fn attach_monitor(&self, monitor: Arc<LiveHealthMonitor>) {
        if !self.current_phase().is_at_rest() {
            monitor.suspend();
        }
        *lock(&self.monitor) = Some(monitor);
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn context(&self) -> Arc<EngineContext> {
        Arc::clone(&self.context)
    }

    pub fn current_phase(&self) -> TestPhase {
        self.context.phase()
    }

    pub fn gauge(&self) -> LiveGauge {
        self.context.gauge()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.context.subscribe()
    }

    pub fn watch_phase(&self) -> watch::Receiver<TestPhase> {
        self.context.watch_phase()
    }

    /// Begin a run against `endpoint`
    ///
    /// Returns None without side effects when a run is already in progress.
    /// The handle resolves to the result, or to the error that aborted the run.
    pub fn start(self: &Arc<Self>, endpoint: ServerEndpoint) -> Option<JoinHandle<Result<TestResult>>> {
        let token = {
            let mut current = lock(&self.run_token);
            if !self.context.try_begin_run() {
                return None;
            }
            if let Some(monitor) = lock(&self.monitor).as_ref() {
                monitor.suspend();
            }
            let token = CancellationToken::new();
            *current = Some(token.clone());
            token
        };

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move { engine.execute(endpoint, token).await }))
    }

    /// Cancel the run in progress; returns false when there is none
    pub fn cancel(&self) -> bool {
        match lock(&self.run_token).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn execute(&self, endpoint: ServerEndpoint, token: CancellationToken) -> Result<TestResult> {
        let operation = self.logger.start_operation("speed_test").await;
        let outcome = self.run_phases(&endpoint, &token).await;

        // Resume and return to rest under the run lock start() takes
        {
            let mut current = lock(&self.run_token);
            current.take();
            if let Some(monitor) = lock(&self.monitor).as_ref() {
                monitor.resume();
            }
            let rest = if outcome.is_ok() { TestPhase::Complete } else { TestPhase::Idle };
            self.context.set_phase(rest);
        }

        let outcome = match outcome {
            Ok(result) => {
                self.context.publish(EngineEvent::Completed(result.clone()));
                Ok(result)
            }
            Err(error) => {
                self.context.publish(EngineEvent::Aborted {
                    reason: error.to_string(),
                });
                self.logger
                    .warn("Speed test aborted")
                    .correlation_id(&operation)
                    .error_info(&error)
                    .log()
                    .await;
                Err(error)
            }
        };

        self.logger
            .end_operation(&operation, "speed_test", outcome.is_ok())
            .await;
        outcome
    }

    async fn run_phases(&self, endpoint: &ServerEndpoint, token: &CancellationToken) -> Result<TestResult> {
        endpoint.validate()?;
        self.config.validate()?;
        crate::log_info!(
            self.logger,
            "Testing against {} with {} streams",
            endpoint.name,
            self.config.stream_count
        );

        let mut perf = PerformanceLogger::new(&self.logger);
        let sampler = ProbeSampler::from_config(self.client.clone(), &self.config).with_logger(&self.logger);
        let tester = ThroughputTester::new(self.client.clone(), self.config.clone())
            .with_context(self.context())
            .with_logger(&self.logger);

        perf.start_timing(TestPhase::Ping).await;
        let latency = sampler
            .measure(endpoint, self.config.probe_count, self.config.probe_delay(), token)
            .await?;
        perf.end_timing(TestPhase::Ping).await;
        perf.log_latency(&latency).await;
        self.context.publish(EngineEvent::LatencyMeasured(latency));

        let download_mbps = self.measure(&tester, &mut perf, Direction::Download, endpoint, token).await?;

        self.context.set_phase(TestPhase::Transition);
        self.context.publish_progress(TestPhase::Transition, 100.0, 0.0);
        crate::log_debug!(self.logger, "Settling for {}ms before upload", self.config.transition_ms);
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AppError::cancelled("run cancelled between download and upload")),
            _ = sleep(self.config.transition()) => {}
        }

        let upload_mbps = self.measure(&tester, &mut perf, Direction::Upload, endpoint, token).await?;

        let result = TestResult::new(endpoint.id.clone(), download_mbps, upload_mbps, latency);
        perf.log_test_result(&result).await;
        Ok(result)
    }

    async fn measure(
        &self,
        tester: &ThroughputTester,
        perf: &mut PerformanceLogger,
        direction: Direction,
        endpoint: &ServerEndpoint,
        token: &CancellationToken,
    ) -> Result<f64> {
        let phase = direction.phase();
        self.context.set_phase(phase);

        perf.start_timing(phase).await;
        let mbps = tester.run(direction, endpoint, token).await?;
        perf.end_timing(phase).await;
        perf.log_throughput(direction, mbps).await;

        self.context.publish(EngineEvent::ThroughputMeasured { direction, mbps });
        Ok(mbps)
    }
}
