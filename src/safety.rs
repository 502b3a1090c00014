//! Override safety supervisor.
//!
//! Override suppresses the auto-alert so the operator can run the pump by
//! hand.  The supervisor runs **every tick after the fill controller** and
//! turns override back off once flow has been stopped for longer than the
//! safety window.
//!
//! ## Timer lifecycle
//!
//! 1. Enabling override stamps `override_enabled_at`.
//! 2. Each tick with flow detected re-stamps it, so override cannot
//!    expire mid-fill.
//! 3. Each tick with the sensor disconnected also re-stamps it: a sensor
//!    that cannot confirm flow never expires override, and the window
//!    restarts from reconnection.
//! 4. Connected, not flowing, window elapsed: override is disabled and
//!    the change is reported to the caller.

use std::time::{Duration, Instant};

use log::warn;

use crate::sensors::FlowReading;
use crate::session::FillSession;

/// Who switched override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideReason {
    /// Operator pressed OV.
    Operator,
    /// Flow stayed stopped past the safety window.
    SafetyTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideChange {
    pub enabled: bool,
    pub reason: OverrideReason,
}

/// Override safety supervisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideSupervisor {
    window: Duration,
    stopped_threshold: f64,
}

impl OverrideSupervisor {
    pub fn new(window: Duration, stopped_threshold_l_per_s: f64) -> Self {
        Self {
            window,
            stopped_threshold: stopped_threshold_l_per_s,
        }
    }

    /// Evaluate one tick.  Returns the change when override was forced off.
    pub fn evaluate(
        &self,
        session: &mut FillSession,
        reading: &FlowReading,
        connected: bool,
        now: Instant,
    ) -> Option<OverrideChange> {
        if !session.override_enabled {
            return None;
        }

        if !connected || reading.is_flowing(self.stopped_threshold) {
            session.override_enabled_at = Some(now);
            return None;
        }

        let since = session.override_enabled_at.get_or_insert(now);
        let idle = now.saturating_duration_since(*since);
        if idle <= self.window {
            return None;
        }

        warn!(
            "SAFETY | override disabled: flow {:.4} L/s below {:.4} L/s for {:.0}s",
            reading.flow_rate_l_per_s,
            self.stopped_threshold,
            idle.as_secs_f64()
        );
        session.override_enabled = false;
        session.override_enabled_at = None;
        Some(OverrideChange {
            enabled: false,
            reason: OverrideReason::SafetyTimeout,
        })
    }
}
