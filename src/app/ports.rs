//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FillService / CommandRouter (domain)
//! ```
//!
//! Driven adapters (sensor transport, power line, screen, store, event
//! sinks) implement these traits.  The domain consumes them via generics,
//! so the core never touches sockets, GPIO or files directly.
//!
//! Relay outputs are not a port here: they are
//! [`embedded_hal::digital::OutputPin`]s wrapped by
//! [`RelayActuator`](crate::drivers::relay::RelayActuator).

use crate::error::{StoreError, TransportError};
use crate::sensors::frame::Frame;
use crate::session::{FillRecord, ModalDialog, Presets, SubTest, Totals, UiMode};

// ───────────────────────────────────────────────────────────────
// Sensor transport (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Request/response process-data exchange keyed by a logical port.
pub trait SensorTransport {
    /// Fetch one raw process-data frame of (up to) `len` bytes.
    ///
    /// A transport failure is an `Err`; it is never disguised as a frame.
    fn exchange(&mut self, port: u8, len: usize) -> Result<Frame, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor power (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Physical power line feeding the sensor.  Only the recovery path of
/// [`SensorLink`](crate::sensors::link::SensorLink) drives it.
pub trait PowerLine {
    fn set_power(&mut self, port: u8, on: bool) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Presentation layer (driven adapter: domain ↔ screen)
// ───────────────────────────────────────────────────────────────

/// The screen owns which view is active; the router reads it to pick a
/// dispatch table and asks it to navigate.
///
/// Methods take `&self` because the screen is shared between listener
/// threads; implementations synchronise internally.
pub trait ScreenPort: Send + Sync {
    /// Currently active view.
    fn ui_mode(&self) -> UiMode;

    /// Confirmation dialog on top of the active view, if any.
    fn pending_dialog(&self) -> Option<ModalDialog>;

    /// Number of selectable menu items.
    fn menu_len(&self) -> usize;

    /// Scroll the log viewer or fill history (`+1` = down).
    fn scroll(&self, delta: i32);

    /// Leave the active full-screen view and return to Normal.
    fn exit_screen(&self);

    fn open_menu(&self);

    fn highlight_menu(&self, index: usize);

    fn activate_menu(&self, index: usize);

    /// The operator confirmed the exit dialog.
    fn confirm_exit(&self);

    /// Dismiss whichever dialog is pending without acting on it.
    fn close_dialog(&self);

    fn dismiss_reminders(&self);

    /// Tick one full-test checkbox.
    fn mark_test_passed(&self, test: SubTest);
}

// ───────────────────────────────────────────────────────────────
// Presets and totals (driven adapter: domain ↔ persistence)
// ───────────────────────────────────────────────────────────────

/// Fill/mix presets and cumulative totals.  Format and location are the
/// implementation's concern.
pub trait FillStore: Send {
    /// `Ok(None)` on first start.
    fn load_presets(&mut self) -> Result<Option<Presets>, StoreError>;

    fn save_presets(&mut self, presets: &Presets) -> Result<(), StoreError>;

    /// Add a confirmed fill to the daily and season totals and the
    /// history.  Returns the updated totals.
    fn record_fill(&mut self, record: &FillRecord) -> Result<Totals, StoreError>;

    /// Zero the season total.  Returns the total that was cleared.
    fn reset_season(&mut self) -> Result<f64, StoreError>;

    fn totals(&self) -> Totals;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
