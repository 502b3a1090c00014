//! Fill-cycle state machine.
//!
//! Advanced once per [`FlowReading`].  Tracks flow start/stop edges,
//! snapshots a pending result when flow stops and decides when the
//! auto-alert relay should fire.  No I/O: the caller acts on the
//! returned [`FillDecision`].

use log::{debug, info};

use super::shutoff::{CalibrationCurve, predicted_threshold_gal};
use crate::sensors::FlowReading;
use crate::session::{FillResult, FillSession, ShutoffType};

/// Why the auto-alert fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertTrigger {
    pub actual_gallons: f64,
    pub requested_gallons: f64,
    pub threshold_gallons: f64,
}

/// What one tick decided.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FillDecision {
    pub flow_started: bool,
    /// Set on the tick flow stopped.
    pub completed: Option<FillResult>,
    /// Fire the relay for the auto-alert duration.
    pub fire_alert: Option<AlertTrigger>,
    /// The alert latch was cleared because the fill fell back below the
    /// trigger point.
    pub rearmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillController {
    stopped_threshold: f64,
    curve: CalibrationCurve,
}

impl FillController {
    pub fn new(stopped_threshold_l_per_s: f64, curve: CalibrationCurve) -> Self {
        Self {
            stopped_threshold: stopped_threshold_l_per_s,
            curve,
        }
    }

    pub fn curve(&self) -> &CalibrationCurve {
        &self.curve
    }

    /// Advance the session by one reading.
    ///
    /// `connected` is the link's connection state at the time of the
    /// reading; a disconnected sensor never triggers the alert.
    pub fn advance(
        &self,
        reading: &FlowReading,
        connected: bool,
        session: &mut FillSession,
    ) -> FillDecision {
        let mut decision = FillDecision::default();
        let now_flowing = reading.is_flowing(self.stopped_threshold);
        let actual = reading.totalizer_gallons();

        // ── Flow edges ────────────────────────────────────────
        match (session.is_flowing, now_flowing) {
            (true, false) => {
                let shutoff_type = if session.alert_already_fired {
                    ShutoffType::Auto
                } else {
                    ShutoffType::Manual
                };
                let result = FillResult {
                    requested_gallons: session.requested_gallons,
                    actual_gallons: actual,
                    shutoff_type,
                    completed_at: reading.captured_at,
                };
                info!(
                    "FILL | flow stopped: requested={:.2} actual={:.2} ({shutoff_type})",
                    result.requested_gallons, result.actual_gallons
                );
                session.pending_result = Some(result);
                decision.completed = Some(result);
            }
            (false, true) => {
                if session.pending_result.is_some() {
                    info!("FILL | new fill supersedes unconfirmed result");
                }
                session.alert_already_fired = false;
                session.pending_result = None;
                session.display_acknowledged = false;
                decision.flow_started = true;
            }
            _ => {}
        }
        session.is_flowing = now_flowing;

        // ── Auto-alert ────────────────────────────────────────
        let threshold = predicted_threshold_gal(reading.flow_rate_l_per_s, &self.curve);
        let trigger_point = session.requested_gallons - threshold;

        if now_flowing
            && !session.override_enabled
            && connected
            && !session.alert_already_fired
            && actual >= trigger_point
        {
            session.alert_already_fired = true;
            decision.fire_alert = Some(AlertTrigger {
                actual_gallons: actual,
                requested_gallons: session.requested_gallons,
                threshold_gallons: threshold,
            });
        } else if session.alert_already_fired && actual < trigger_point {
            debug!("FILL | alert re-armed at {actual:.2} gal (trigger {trigger_point:.2})");
            session.alert_already_fired = false;
            decision.rearmed = true;
        }

        decision
    }
}
