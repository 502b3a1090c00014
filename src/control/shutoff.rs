//! Predictive shutoff model.
//!
//! The pump and delivery line keep moving liquid after the stop relay is
//! commanded.  The coast distance grows roughly linearly with flow rate,
//! so the controller fires the relay `threshold` gallons before target.

use serde::{Deserialize, Serialize};

use crate::sensors::L_PER_S_TO_GPM;

/// Calibration curve: coast gallons = slope × GPM + intercept.
///
/// Calibration points for the reference pump: 22 GPM → 0.45 gal,
/// 70 GPM → 1.92 gal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    pub slope: f64,
    pub intercept: f64,
    /// Lower bound on the lead distance (gallons).
    pub min_threshold_gal: f64,
}

impl Default for CalibrationCurve {
    fn default() -> Self {
        Self {
            slope: 0.030625,
            intercept: -0.22375,
            min_threshold_gal: 0.1,
        }
    }
}

/// Predicted coast distance (gallons) at the given flow rate.
///
/// Total over all inputs.  Negative and NaN flow rates are treated as
/// zero flow, and the result never drops below `curve.min_threshold_gal`.
pub fn predicted_threshold_gal(flow_rate_l_per_s: f64, curve: &CalibrationCurve) -> f64 {
    let gpm = flow_rate_l_per_s.max(0.0) * L_PER_S_TO_GPM;
    let threshold = curve.slope * gpm + curve.intercept;
    threshold.max(curve.min_threshold_gal)
}
