//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (stderr via `env_logger` on the Pi).  A display or
//! telemetry adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::safety::OverrideReason;

/// Adapter that logs every [`AppEvent`] as one tagged line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                requested_gallons,
                mode,
            } => {
                info!("START | mode={mode} requested={requested_gallons:.0}gal");
            }
            AppEvent::FlowStarted => info!("FLOW  | started"),
            AppEvent::AlertFired {
                actual_gallons,
                requested_gallons,
                threshold_gallons,
            } => {
                info!(
                    "ALERT | actual={actual_gallons:.2} requested={requested_gallons:.2} \
                     lead={threshold_gallons:.2}gal"
                );
            }
            AppEvent::FillCompleted(r) => {
                info!(
                    "FILL  | done requested={:.2} actual={:.2} diff={:+.2} shutoff={}",
                    r.requested_gallons,
                    r.actual_gallons,
                    r.diff_gallons(),
                    r.shutoff_type
                );
            }
            AppEvent::FillCommitted { result, totals } => {
                info!(
                    "FILL  | committed {:.2}gal | day={:.1} season={:.1}",
                    result.actual_gallons, totals.daily_gallons, totals.season_gallons
                );
            }
            AppEvent::OverrideChanged(change) => {
                let reason = match change.reason {
                    OverrideReason::Operator => "operator",
                    OverrideReason::SafetyTimeout => "safety timeout",
                };
                info!(
                    "OVRD  | {} ({reason})",
                    if change.enabled { "ON" } else { "OFF" }
                );
            }
            AppEvent::SensorFault(kind) => warn!("FAULT | sensor: {kind}"),
            AppEvent::SensorRecovered { down_for } => {
                info!("FAULT | sensor recovered after {:.1}s", down_for.as_secs_f64());
            }
            AppEvent::PresetChanged { mode, gallons } => {
                info!("PRESET| {mode} = {gallons:.0}gal");
            }
            AppEvent::ModeSwitched {
                to,
                requested_gallons,
            } => {
                info!("MODE  | {to} requested={requested_gallons:.0}gal");
            }
            AppEvent::PumpStopRequested => info!("PUMP  | manual stop"),
            AppEvent::SeasonReset { previous_gallons } => {
                info!("TOTAL | season reset (was {previous_gallons:.1}gal)");
            }
        }
    }
}
