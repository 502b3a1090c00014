//! Integration tests: SensorLink → FillService → alert relay / events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tankfill::app::events::AppEvent;
use tankfill::app::service::FillService;
use tankfill::config::ControllerConfig;
use tankfill::drivers::relay::{PulseWorker, RelayActuator};
use tankfill::error::TransportError;
use tankfill::safety::{OverrideChange, OverrideReason};
use tankfill::sensors::FaultKind;
use tankfill::sensors::link::{LinkSettings, SensorLink};
use tankfill::session::{FillMode, FillSession, Presets, SharedState};

use crate::mock_hw::{RecordingPin, RecordingPower, ScriptedTransport, VecSink};

struct Rig {
    service: FillService<ScriptedTransport, RecordingPower>,
    transport: ScriptedTransport,
    power: RecordingPower,
    alert_pin: RecordingPin,
    sink: VecSink,
    t0: Instant,
}

impl Rig {
    fn new(cfg: ControllerConfig) -> Self {
        let transport = ScriptedTransport::new();
        let power = RecordingPower::default();
        let alert_pin = RecordingPin::default();
        let link = SensorLink::new(transport.clone(), power.clone(), LinkSettings::from_config(&cfg));
        let shared = SharedState::new(FillSession::new(Presets::from_config(&cfg), FillMode::Fill));
        let alert = PulseWorker::new(
            Arc::new(RelayActuator::new(alert_pin.clone(), "auto-alert")),
            "auto-alert",
        );
        Self {
            service: FillService::new(link, alert, shared, &cfg),
            transport,
            power,
            alert_pin,
            sink: VecSink::new(),
            t0: Instant::now(),
        }
    }

    fn tick(&mut self, at: Duration) -> tankfill::app::service::TickReport {
        self.service.tick_at(self.t0 + at, &mut self.sink)
    }
}

fn cfg() -> ControllerConfig {
    ControllerConfig {
        recovery_settle_ms: 0,
        recovery_handshake_ms: 0,
        auto_alert_ms: 1,
        override_safety_secs: 1,
        ..ControllerConfig::default()
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn alert_fires_once_at_predicted_lead() {
    let mut rig = Rig::new(cfg());
    // 1 L/s is ~15.9 GPM: lead ~0.26 gal, trigger ~59.74 gal.
    rig.transport.push_gallons(59.0, 1.0);
    rig.transport.push_gallons(59.5, 1.0);
    rig.transport.push_gallons(59.8, 1.0);
    rig.transport.push_gallons(59.9, 1.0);

    let first = rig.tick(ms(0));
    assert!(first.decision.flow_started);
    assert!(first.decision.fire_alert.is_none());
    assert!(rig.tick(ms(200)).decision.fire_alert.is_none());

    let fired = rig.tick(ms(400));
    let trigger = fired.decision.fire_alert.expect("alert at 59.8 gal");
    assert!((trigger.threshold_gallons - 0.2617).abs() < 1e-3);
    assert!(fired.alert_pulse_started);

    assert!(rig.tick(ms(600)).decision.fire_alert.is_none());
    assert!(rig.service.alert_worker().wait_idle(Duration::from_secs(2)));
    assert_eq!(rig.alert_pin.pulses(), 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::AlertFired { .. })), 1);
}

#[test]
fn override_suppresses_alert_until_cleared() {
    let mut rig = Rig::new(cfg());
    rig.service
        .shared()
        .with(|core| core.session.toggle_override(rig.t0));
    rig.transport.push_gallons(59.9, 1.0);
    rig.transport.push_gallons(60.2, 1.0);
    rig.transport.push_gallons(60.5, 1.0);

    assert!(rig.tick(ms(0)).decision.fire_alert.is_none());
    assert!(rig.tick(ms(200)).decision.fire_alert.is_none());

    rig.service
        .shared()
        .with(|core| core.session.toggle_override(rig.t0 + ms(300)));
    assert!(rig.tick(ms(400)).decision.fire_alert.is_some());
}

#[test]
fn override_times_out_when_flow_idle() {
    let mut rig = Rig::new(cfg());
    rig.service
        .shared()
        .with(|core| core.session.toggle_override(rig.t0));
    rig.transport.push_gallons(12.0, 0.0);

    assert!(rig.tick(ms(0)).override_change.is_none());
    assert!(rig.tick(ms(500)).override_change.is_none());
    let report = rig.tick(ms(1200));
    assert_eq!(
        report.override_change,
        Some(OverrideChange {
            enabled: false,
            reason: OverrideReason::SafetyTimeout,
        })
    );
    assert!(!rig.service.shared().session().override_enabled);
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::OverrideChanged(report.override_change.unwrap()))
    );
}

#[test]
fn override_survives_while_flowing() {
    let mut rig = Rig::new(cfg());
    rig.service
        .shared()
        .with(|core| core.session.toggle_override(rig.t0));
    for i in 0..10u32 {
        rig.transport.push_gallons(10.0 + f64::from(i), 1.0);
    }
    for i in 0..10u64 {
        assert!(rig.tick(ms(i * 500)).override_change.is_none());
    }
    assert!(rig.service.shared().session().override_enabled);
}

#[test]
fn stop_edge_leaves_manual_result_pending() {
    let mut rig = Rig::new(cfg());
    rig.transport.push_gallons(20.0, 1.0);
    rig.transport.push_gallons(21.0, 0.0);

    rig.tick(ms(0));
    let stopped = rig.tick(ms(200));
    let result = stopped.decision.completed.expect("stop edge");
    assert_eq!(result.shutoff_type, tankfill::session::ShutoffType::Manual);
    assert!((result.actual_gallons - 21.0).abs() < 1e-3);
    assert_eq!(
        rig.service.shared().session().pending_result,
        Some(result)
    );
}

#[test]
fn frozen_frames_raise_stale_and_power_cycle() {
    let mut rig = Rig::new(cfg());
    rig.transport.push_gallons(30.0, 0.5);

    for i in 0..24u64 {
        assert_eq!(rig.tick(ms(i * 200)).reading.fault, None, "tick {i}");
    }
    let stale = rig.tick(ms(24 * 200));
    assert_eq!(stale.reading.fault, Some(FaultKind::Stale));
    assert!(!stale.reading.valid);
    assert!((stale.reading.totalizer_gallons() - 30.0).abs() < 1e-3);

    rig.service.link_mut().join_recovery();
    assert_eq!(rig.power.calls(), vec![(2, false), (2, true)]);
    assert!(rig.sink.events.contains(&AppEvent::SensorFault(FaultKind::Stale)));

    rig.transport.push_gallons(30.1, 0.5);
    let back = rig.tick(ms(25 * 200));
    assert_eq!(back.reading.fault, None);
    assert!(
        rig.sink
            .count(|e| matches!(e, AppEvent::SensorRecovered { .. }))
            == 1
    );
}

#[test]
fn disconnected_sensor_defers_alert() {
    let mut rig = Rig::new(cfg());
    rig.transport.push_gallons(50.0, 1.0);
    rig.transport
        .push(Err(TransportError::Io(std::io::ErrorKind::ConnectionRefused)));

    rig.tick(ms(0));
    rig.service
        .shared()
        .with(|core| core.session.requested_gallons = 50.0);

    // Past the disconnect timeout the degraded reading still carries the
    // last good values, which alone would cross the trigger.
    let degraded = rig.tick(ms(6000));
    assert_eq!(degraded.reading.fault, Some(FaultKind::TransportError));
    assert!(!degraded.connected);
    assert!(degraded.decision.fire_alert.is_none());
    assert_eq!(
        rig.sink
            .count(|e| *e == AppEvent::SensorFault(FaultKind::TransportError)),
        1
    );

    rig.transport.push_gallons(50.1, 1.0);
    let back = rig.tick(ms(6200));
    assert!(back.connected);
    assert!(back.decision.fire_alert.is_some());
}

#[test]
fn all_zero_frame_is_a_fault_not_a_stop() {
    let mut rig = Rig::new(cfg());
    rig.transport.push_gallons(10.0, 1.0);
    rig.transport
        .push(Ok(tankfill::sensors::frame::encode(0.0, 0.0, 15)));

    rig.tick(ms(0));
    let silent = rig.tick(ms(200));
    assert_eq!(silent.reading.fault, Some(FaultKind::AllZero));
    // Degraded readings carry the last flow rate, so no stop edge.
    assert!(silent.decision.completed.is_none());
    assert!(rig.service.shared().session().is_flowing);
}
