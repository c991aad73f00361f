//! Observable engine state: current phase, live gauge and event stream

use crate::models::{HealthReading, LatencyEstimate, TestResult};
use crate::types::{Direction, TestPhase};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

/// Events buffered per subscriber before a slow reader starts lagging
const EVENT_BUFFER: usize = 512;

/// Snapshot shown by a live speed dial
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LiveGauge {
    pub phase: TestPhase,
    /// Completion of the current phase, 0 to 100
    pub percent: f64,
    /// Latest instantaneous rate
    pub mbps: f64,
}

/// Everything the engine reports to its subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineEvent {
    PhaseChanged(TestPhase),
    Progress {
        phase: TestPhase,
        percent: f64,
        mbps: f64,
    },
    LatencyMeasured(LatencyEstimate),
    ThroughputMeasured {
        direction: Direction,
        mbps: f64,
    },
    Completed(TestResult),
    Aborted {
        reason: String,
    },
    Health(HealthReading),
}

/// Subscription surface owned by a state machine
///
/// Phase and gauge are `watch` values so late readers see the latest state;
/// discrete occurrences go out on a `broadcast` channel.
#[derive(Debug)]
pub struct EngineContext {
    phase: watch::Sender<TestPhase>,
    gauge: watch::Sender<LiveGauge>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineContext {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(TestPhase::Idle);
        let (gauge, _) = watch::channel(LiveGauge::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { phase, gauge, events }
    }

    pub fn phase(&self) -> TestPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<TestPhase> {
        self.phase.subscribe()
    }

    pub fn gauge(&self) -> LiveGauge {
        *self.gauge.borrow()
    }

    pub fn watch_gauge(&self) -> watch::Receiver<LiveGauge> {
        self.gauge.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Move from a resting phase to PING in one step
    ///
    /// Returns false, and changes nothing, when a run is already in progress.
    pub fn try_begin_run(&self) -> bool {
        let began = self.phase.send_if_modified(|phase| {
            if phase.is_at_rest() {
                *phase = TestPhase::Ping;
                true
            } else {
                false
            }
        });

        if began {
            self.reset_gauge(TestPhase::Ping);
            self.publish(EngineEvent::PhaseChanged(TestPhase::Ping));
        }
        began
    }

    pub fn set_phase(&self, phase: TestPhase) {
        let previous = self.phase.send_replace(phase);
        self.reset_gauge(phase);
        if previous != phase {
            self.publish(EngineEvent::PhaseChanged(phase));
        }
    }

    pub fn publish_progress(&self, phase: TestPhase, percent: f64, mbps: f64) {
        self.gauge.send_replace(LiveGauge { phase, percent, mbps });
        self.publish(EngineEvent::Progress { phase, percent, mbps });
    }

    /// Send an event to current subscribers; with none listening it is dropped
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    fn reset_gauge(&self, phase: TestPhase) {
        self.gauge.send_replace(LiveGauge {
            phase,
            percent: 0.0,
            mbps: 0.0,
        });
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new()
    }
}
