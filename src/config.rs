//! Controller configuration parameters
//!
//! All tunable parameters for the fill controller.  Defaults match the
//! reference deployment; a JSON file can override any subset of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::shutoff::CalibrationCurve;
use crate::pins;
use crate::sensors::frame::{DEFAULT_FRAME_LEN, MAX_FRAME_LEN, MIN_DECODABLE_LEN};

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Sensor link ---
    /// IO-Link port of the flow meter (0-3)
    pub sensor_port: u8,
    /// Expected process-data frame length (bytes)
    pub frame_len: usize,
    /// Poll period (milliseconds)
    pub poll_interval_ms: u32,
    /// Consecutive byte-identical frames that count as stale
    pub stale_frame_limit: u32,
    /// No successful read for this long means disconnected (milliseconds)
    pub disconnect_timeout_ms: u32,
    /// Minimum time between power-cycle attempts (milliseconds)
    pub recovery_interval_ms: u32,
    /// Power-off settle time during recovery (milliseconds)
    pub recovery_settle_ms: u32,
    /// Power-on handshake wait during recovery (milliseconds)
    pub recovery_handshake_ms: u32,

    // --- Flow / shutoff ---
    /// Flow below this rate (L/s) counts as stopped
    pub stopped_threshold_l_per_s: f64,
    /// Coast-distance calibration
    pub curve: CalibrationCurve,

    // --- Relays ---
    /// Auto-alert relay pulse (milliseconds)
    pub auto_alert_ms: u32,
    /// Manual pump-stop relay pulse (milliseconds)
    pub pump_stop_ms: u32,
    /// Override auto-disables after flow has been stopped this long (seconds)
    pub override_safety_secs: u32,
    /// Delay between committing a fill and resetting the totalizer (seconds)
    pub flow_reset_delay_secs: u32,
    /// Totalizer reset relay pulse (milliseconds)
    pub flow_reset_pulse_ms: u32,

    // --- Fill presets ---
    /// Fill-mode preset used when the store has none (gallons)
    pub default_fill_gallons: f64,
    /// Mix-mode preset used when the store has none (gallons)
    pub default_mix_gallons: f64,
    /// Warning band below target (gallons)
    pub warning_band_gallons: f64,

    // --- Links ---
    /// Switch box heartbeat timeout (seconds)
    pub heartbeat_timeout_secs: u32,
    pub serial_device: String,
    pub serial_baud: u32,
    pub socket_port: u16,
    pub iol_hat_addr: String,
    pub store_dir: PathBuf,
    pub pump_stop_gpio: u8,
    pub flow_reset_gpio: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Sensor link
            sensor_port: pins::FLOW_METER_IOL_PORT,
            frame_len: DEFAULT_FRAME_LEN,
            poll_interval_ms: 200,
            stale_frame_limit: 25,
            disconnect_timeout_ms: 5_000,
            recovery_interval_ms: 15_000,
            recovery_settle_ms: 500,
            recovery_handshake_ms: 1_500,

            // Flow / shutoff
            stopped_threshold_l_per_s: 0.001,
            curve: CalibrationCurve::default(),

            // Relays
            auto_alert_ms: 5_000,
            pump_stop_ms: 5_000,
            override_safety_secs: 60,
            flow_reset_delay_secs: 30,
            flow_reset_pulse_ms: 200,

            // Presets
            default_fill_gallons: 60.0,
            default_mix_gallons: 40.0,
            warning_band_gallons: 2.0,

            // Links
            heartbeat_timeout_secs: 10,
            serial_device: pins::SWITCH_BOX_UART.into(),
            serial_baud: pins::SWITCH_BOX_BAUD,
            socket_port: pins::APP_SOCKET_PORT,
            iol_hat_addr: pins::IOL_HAT_ADDR.into(),
            store_dir: PathBuf::from("/var/lib/tankfill"),
            pump_stop_gpio: pins::PUMP_STOP_RELAY_GPIO,
            flow_reset_gpio: pins::FLOW_RESET_RELAY_GPIO,
        }
    }
}

impl ControllerConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound)?;
        Self::from_json_str(&text)
    }

    /// Startup configuration: `path` if given, defaults otherwise.
    /// Either way the result is validated.
    pub fn load(path: Option<&Path>) -> crate::error::Result<Self> {
        let cfg = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no deployment could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::ValidationFailed as bad;

        if self.sensor_port > 3 {
            return Err(bad("sensor_port must be 0-3"));
        }
        if !(MIN_DECODABLE_LEN..=MAX_FRAME_LEN).contains(&self.frame_len) {
            return Err(bad("frame_len must be 12-32"));
        }
        if self.poll_interval_ms == 0 {
            return Err(bad("poll_interval_ms must be > 0"));
        }
        if self.stale_frame_limit < 2 {
            return Err(bad("stale_frame_limit must be >= 2"));
        }
        if self.disconnect_timeout_ms < self.poll_interval_ms {
            return Err(bad("disconnect_timeout_ms shorter than one poll"));
        }
        if !(self.stopped_threshold_l_per_s.is_finite() && self.stopped_threshold_l_per_s >= 0.0) {
            return Err(bad("stopped_threshold_l_per_s must be >= 0"));
        }
        let c = &self.curve;
        if !(c.slope.is_finite() && c.intercept.is_finite()) {
            return Err(bad("calibration curve must be finite"));
        }
        if !(c.min_threshold_gal.is_finite() && c.min_threshold_gal > 0.0) {
            return Err(bad("min_threshold_gal must be > 0"));
        }
        if self.auto_alert_ms == 0 || self.pump_stop_ms == 0 || self.flow_reset_pulse_ms == 0 {
            return Err(bad("relay pulse durations must be > 0"));
        }
        if self.default_fill_gallons < 0.0 || self.default_mix_gallons < 0.0 {
            return Err(bad("default presets must be >= 0"));
        }
        if self.warning_band_gallons < 0.0 {
            return Err(bad("warning_band_gallons must be >= 0"));
        }
        Ok(())
    }

    // ── Durations ─────────────────────────────────────────────

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.disconnect_timeout_ms))
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.recovery_interval_ms))
    }

    pub fn recovery_settle(&self) -> Duration {
        Duration::from_millis(u64::from(self.recovery_settle_ms))
    }

    pub fn recovery_handshake(&self) -> Duration {
        Duration::from_millis(u64::from(self.recovery_handshake_ms))
    }

    pub fn auto_alert(&self) -> Duration {
        Duration::from_millis(u64::from(self.auto_alert_ms))
    }

    pub fn pump_stop(&self) -> Duration {
        Duration::from_millis(u64::from(self.pump_stop_ms))
    }

    pub fn override_safety_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.override_safety_secs))
    }

    pub fn flow_reset_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.flow_reset_delay_secs))
    }

    pub fn flow_reset_pulse(&self) -> Duration {
        Duration::from_millis(u64::from(self.flow_reset_pulse_ms))
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.heartbeat_timeout_secs))
    }
}

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file could not be read.
    NotFound,
    /// The config file is not valid JSON for this schema.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NotFound => Self::Config("config not found"),
            ConfigError::Corrupted => Self::Config("config corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
        }
    }
}
