//! Ambient reachability readings while no test is running

use crate::engine::{EngineContext, EngineEvent};
use crate::probe::ProbeSampler;
use crate::types::TestPhase;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use crate::models::HealthReading;

struct MonitorTask {
    handle: JoinHandle<()>,
    stop: CancellationToken,
}

/// Periodic single-shot latency probe for an idle display
///
/// Probing only happens while the observed phase is at rest and the monitor
/// is not suspended, so it never competes with a measurement for bandwidth.
pub struct LiveHealthMonitor {
    sampler: ProbeSampler,
    url: String,
    interval: Duration,
    suspended: watch::Sender<bool>,
    readings: watch::Sender<Option<HealthReading>>,
    phase: Option<watch::Receiver<TestPhase>>,
    context: Option<Arc<EngineContext>>,
    task: Mutex<Option<MonitorTask>>,
}

impl LiveHealthMonitor {
    pub fn new(sampler: ProbeSampler, url: impl Into<String>, interval: Duration) -> Self {
        let (suspended, _) = watch::channel(false);
        let (readings, _) = watch::channel(None);
        Self {
            sampler,
            url: url.into(),
            interval,
            suspended,
            readings,
            phase: None,
            context: None,
            task: Mutex::new(None),
        }
    }

    /// Follow an engine's phase and publish readings as its `Health` events
    pub fn observing(mut self, context: Arc<EngineContext>) -> Self {
        self.phase = Some(context.watch_phase());
        self.context = Some(context);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<HealthReading>> {
        self.readings.subscribe()
    }

    pub fn latest(&self) -> Option<HealthReading> {
        *self.readings.borrow()
    }

    pub fn suspend(&self) {
        self.suspended.send_replace(true);
    }

    pub fn resume(&self) {
        self.suspended.send_replace(false);
    }

    pub fn is_suspended(&self) -> bool {
        *self.suspended.borrow()
    }

    fn may_probe(&self) -> bool {
        let at_rest = self
            .phase
            .as_ref()
            .map_or(true, |phase| phase.borrow().is_at_rest());
        at_rest && !self.is_suspended()
    }

    /// Take one reading if allowed, otherwise return None without probing
    ///
    /// A probe still in flight when the monitor is suspended is abandoned.
    pub async fn tick(&self) -> Option<HealthReading> {
        if !self.may_probe() {
            return None;
        }

        let mut suspended = self.suspended.subscribe();
        let rtt = tokio::select! {
            biased;
            _ = suspended.wait_for(|suspended| *suspended) => return None,
            rtt = self.sampler.probe_once(&self.url) => rtt,
        };

        let reading = HealthReading::from_rtt(rtt);
        self.readings.send_replace(Some(reading));
        if let Some(context) = &self.context {
            context.publish(EngineEvent::Health(reading));
        }
        Some(reading)
    }

    /// Spawn the periodic loop; returns false if it is already running
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = match self.task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        };
        if task.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            return false;
        }

        let stop = CancellationToken::new();
        let monitor = Arc::clone(self);
        let token = stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(monitor.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = monitor.tick() => {}
                }
            }
        });

        *task = Some(MonitorTask { handle, stop });
        true
    }

    /// End the periodic loop and wait for it to exit
    pub async fn stop(&self) {
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(task) = task {
            task.stop.cancel();
            let _ = task.handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        match self.task.lock() {
            Ok(task) => task.as_ref().is_some_and(|running| !running.handle.is_finished()),
            Err(_) => false,
        }
    }
}
