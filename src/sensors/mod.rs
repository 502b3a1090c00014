//! Sensor subsystem: frame decoding and the supervised flow-meter link.
//!
//! [`link::SensorLink`] produces one [`FlowReading`] per poll tick.  A
//! faulted poll still yields a reading: it carries the last known-good
//! totalizer and flow rate, `valid = false` and the [`FaultKind`], so the
//! fill logic degrades instead of stalling.

pub mod frame;
pub mod link;

use core::fmt;
use std::time::Instant;

/// Litres → US gallons.
pub const LITERS_TO_GALLONS: f64 = 0.264_172;
/// L/s → US gallons per minute (60 × 0.264172).
pub const L_PER_S_TO_GPM: f64 = 15.850_323;

/// Why a poll did not produce live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Every byte of the frame was zero: the device is present but not
    /// answering yet.
    AllZero,
    /// The raw frame has not changed for too many polls: the link is
    /// echoing a frozen buffer.
    Stale,
    /// The frame was shorter than the configured length.
    ShortFrame,
    /// The transport failed below the frame layer.
    TransportError,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllZero => write!(f, "device not responding (all-zero frame)"),
            Self::Stale => write!(f, "stale frame"),
            Self::ShortFrame => write!(f, "short frame"),
            Self::TransportError => write!(f, "transport error"),
        }
    }
}

/// One poll's worth of flow-meter data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowReading {
    /// Totalizer (litres).  Always non-negative.
    pub totalizer_liters: f64,
    /// Instantaneous flow rate (L/s).
    pub flow_rate_l_per_s: f64,
    pub captured_at: Instant,
    /// True when the values came from a clean decode this tick.
    pub valid: bool,
    pub fault: Option<FaultKind>,
}

impl FlowReading {
    /// Reading built from a clean decode.
    pub fn live(totalizer_liters: f64, flow_rate_l_per_s: f64, captured_at: Instant) -> Self {
        Self {
            totalizer_liters,
            flow_rate_l_per_s,
            captured_at,
            valid: true,
            fault: None,
        }
    }

    /// Reading that carries last known-good values and a fault.
    pub fn degraded(
        last_good: (f64, f64),
        fault: FaultKind,
        captured_at: Instant,
    ) -> Self {
        Self {
            totalizer_liters: last_good.0,
            flow_rate_l_per_s: last_good.1,
            captured_at,
            valid: false,
            fault: Some(fault),
        }
    }

    pub fn totalizer_gallons(&self) -> f64 {
        self.totalizer_liters * LITERS_TO_GALLONS
    }

    pub fn flow_rate_gpm(&self) -> f64 {
        self.flow_rate_l_per_s * L_PER_S_TO_GPM
    }

    /// Flow counts as running at or above `stopped_threshold` (L/s).
    pub fn is_flowing(&self, stopped_threshold: f64) -> bool {
        self.flow_rate_l_per_s >= stopped_threshold
    }
}
