//! Fill service: the periodic poller at the hexagonal core.
//!
//! [`FillService`] owns the sensor link and the fill/override logic and
//! runs one cycle per poll tick.  All I/O flows through port traits or
//! pulse workers, so the whole service runs against mock adapters.
//!
//! ```text
//!  SensorTransport ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                      │       FillService         │
//!        PowerLine ◀── │ Link · Fill · Override    │ ──▶ PulseWorker (alert)
//!                      └──────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::ControllerConfig;
use crate::control::fill::{FillController, FillDecision};
use crate::drivers::relay::PulseWorker;
use crate::safety::{OverrideChange, OverrideSupervisor};
use crate::sensors::link::SensorLink;
use crate::sensors::{FaultKind, FlowReading};
use crate::session::SharedState;

use super::events::AppEvent;
use super::ports::{EventSink, PowerLine, SensorTransport};

/// Everything one tick observed and decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub reading: FlowReading,
    pub connected: bool,
    pub decision: FillDecision,
    pub override_change: Option<OverrideChange>,
    /// The alert pulse was actually started (not dropped as overlapping).
    pub alert_pulse_started: bool,
}

pub struct FillService<T, P> {
    link: SensorLink<T, P>,
    controller: FillController,
    supervisor: OverrideSupervisor,
    alert: PulseWorker,
    shared: SharedState,
    auto_alert: Duration,
    poll_interval: Duration,
    last_fault: Option<FaultKind>,
    fault_since: Option<Instant>,
    tick_count: u64,
}

impl<T, P> FillService<T, P>
where
    T: SensorTransport,
    P: PowerLine + Send + 'static,
{
    pub fn new(
        link: SensorLink<T, P>,
        alert: PulseWorker,
        shared: SharedState,
        cfg: &ControllerConfig,
    ) -> Self {
        Self {
            link,
            controller: FillController::new(cfg.stopped_threshold_l_per_s, cfg.curve),
            supervisor: OverrideSupervisor::new(
                cfg.override_safety_window(),
                cfg.stopped_threshold_l_per_s,
            ),
            alert,
            shared,
            auto_alert: cfg.auto_alert(),
            poll_interval: cfg.poll_interval(),
            last_fault: None,
            fault_since: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        let (requested_gallons, mode) = self
            .shared
            .with(|core| (core.session.requested_gallons, core.session.mode));
        sink.emit(&AppEvent::Started {
            requested_gallons,
            mode,
        });
        info!("FillService started: {mode} {requested_gallons:.0} gal");
    }

    /// Poll on a fixed period until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool, sink: &mut impl EventSink) {
        self.start(sink);
        while !stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.tick_at(started, sink);
            thread::sleep(self.poll_interval.saturating_sub(started.elapsed()));
        }
        info!("FillService stopped after {} ticks", self.tick_count);
    }

    // ── Per-tick orchestration ────────────────────────────────

    pub fn tick(&mut self, sink: &mut impl EventSink) -> TickReport {
        self.tick_at(Instant::now(), sink)
    }

    /// One cycle: poll → fill state machine → override supervision →
    /// alert pulse.
    pub fn tick_at(&mut self, now: Instant, sink: &mut impl EventSink) -> TickReport {
        self.tick_count += 1;

        // 1. Acquire
        let reading = self.link.poll_at(now);
        let connected = self.link.is_connected(now);
        let status = self.link.status(now);
        self.track_fault(reading.fault, now, sink);

        // 2. Fill logic + override supervision under one short lock
        let controller = &self.controller;
        let supervisor = &self.supervisor;
        let (decision, override_change) = self.shared.with(|core| {
            let decision = controller.advance(&reading, connected, &mut core.session);
            let change = supervisor.evaluate(&mut core.session, &reading, connected, now);
            core.reading = Some(reading);
            core.link = Some(status);
            (decision, change)
        });

        // 3. Events and actuation, lock released
        if decision.flow_started {
            sink.emit(&AppEvent::FlowStarted);
        }
        if let Some(result) = decision.completed {
            sink.emit(&AppEvent::FillCompleted(result));
        }
        if let Some(change) = override_change {
            sink.emit(&AppEvent::OverrideChanged(change));
        }

        let mut alert_pulse_started = false;
        if let Some(trigger) = decision.fire_alert {
            info!(
                "FILL | auto-alert at {:.2}/{:.2} gal, lead {:.2} gal",
                trigger.actual_gallons, trigger.requested_gallons, trigger.threshold_gallons
            );
            sink.emit(&AppEvent::AlertFired {
                actual_gallons: trigger.actual_gallons,
                requested_gallons: trigger.requested_gallons,
                threshold_gallons: trigger.threshold_gallons,
            });
            alert_pulse_started = self.alert.fire(self.auto_alert);
            if !alert_pulse_started {
                warn!("FILL | alert relay busy, pulse skipped");
            }
        }

        TickReport {
            reading,
            connected,
            decision,
            override_change,
            alert_pulse_started,
        }
    }

    fn track_fault(&mut self, fault: Option<FaultKind>, now: Instant, sink: &mut impl EventSink) {
        if fault == self.last_fault {
            return;
        }
        match fault {
            Some(kind) => {
                self.fault_since.get_or_insert(now);
                sink.emit(&AppEvent::SensorFault(kind));
            }
            None => {
                let down_for = self
                    .fault_since
                    .take()
                    .map_or(Duration::ZERO, |since| now.saturating_duration_since(since));
                sink.emit(&AppEvent::SensorRecovered { down_for });
            }
        }
        self.last_fault = fault;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn link(&self) -> &SensorLink<T, P> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut SensorLink<T, P> {
        &mut self.link
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn alert_worker(&self) -> &PulseWorker {
        &self.alert
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
