//! Outbound application events.
//!
//! The [`FillService`](super::service::FillService) and the
//! [`CommandRouter`](crate::router::CommandRouter) emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use std::time::Duration;

use crate::safety::OverrideChange;
use crate::sensors::FaultKind;
use crate::session::{FillMode, FillResult, Totals};

/// Structured events emitted by the controller core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The poller has started (carries the initial requested gallons).
    Started { requested_gallons: f64, mode: FillMode },

    /// Flow crossed the stopped threshold upward.
    FlowStarted,

    /// The auto-alert relay was triggered.
    AlertFired {
        actual_gallons: f64,
        requested_gallons: f64,
        threshold_gallons: f64,
    },

    /// Flow stopped; the result is waiting for operator confirmation.
    FillCompleted(FillResult),

    /// A pending result was committed to the totals.
    FillCommitted { result: FillResult, totals: Totals },

    /// Override was switched on or off.
    OverrideChanged(OverrideChange),

    /// The sensor link entered (or changed) a fault state.
    SensorFault(FaultKind),

    /// The sensor link produced a clean reading after a fault.
    SensorRecovered { down_for: Duration },

    /// The active preset was adjusted.
    PresetChanged { mode: FillMode, gallons: f64 },

    /// Fill/Mix was switched.
    ModeSwitched { to: FillMode, requested_gallons: f64 },

    /// Manual pump-stop pulse requested.
    PumpStopRequested,

    /// The season total was zeroed.
    SeasonReset { previous_gallons: f64 },
}
