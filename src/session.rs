//! Fill session state shared by the poller, the command listeners and
//! the relay/recovery workers.
//!
//! All mutable controller state lives in one [`CoreState`] behind one
//! mutex ([`SharedState`]).  Callers hold the lock for a single update
//! and never across I/O: store writes, screen calls and relay pulses
//! happen after the guard is dropped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::ControllerConfig;
use crate::sensors::FlowReading;
use crate::sensors::link::LinkStatus;

/// Lock a mutex, recovering the inner value if a holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Fill domain types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMode {
    Fill,
    Mix,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill => write!(f, "FILL"),
            Self::Mix => write!(f, "MIX"),
        }
    }
}

/// How a fill ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutoffType {
    /// The auto-alert relay fired during the cycle.
    Auto,
    /// Flow stopped without the alert (operator or external stop).
    Manual,
}

impl fmt::Display for ShutoffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Manual => write!(f, "Manual"),
        }
    }
}

/// Snapshot taken when flow stops; waits for operator confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillResult {
    pub requested_gallons: f64,
    pub actual_gallons: f64,
    pub shutoff_type: ShutoffType,
    pub completed_at: Instant,
}

impl FillResult {
    /// Positive when the tank was overfilled.
    pub fn diff_gallons(&self) -> f64 {
        self.actual_gallons - self.requested_gallons
    }
}

/// A confirmed fill as handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub timestamp: NaiveDateTime,
    pub requested_gallons: f64,
    pub actual_gallons: f64,
    pub shutoff_type: ShutoffType,
}

impl FillRecord {
    pub fn new(result: &FillResult, timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            requested_gallons: result.requested_gallons,
            actual_gallons: result.actual_gallons,
            shutoff_type: result.shutoff_type,
        }
    }

    /// One line of the fill history log.
    pub fn history_line(&self) -> String {
        format!(
            "{} | Requested: {:.3} gal | Actual: {:.3} gal | Diff: {:+.3} gal | {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.requested_gallons,
            self.actual_gallons,
            self.actual_gallons - self.requested_gallons,
            self.shutoff_type,
        )
    }
}

/// Cumulative totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Day `daily_gallons` belongs to.
    pub day: NaiveDate,
    pub daily_gallons: f64,
    pub season_gallons: f64,
}

impl Totals {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            daily_gallons: 0.0,
            season_gallons: 0.0,
        }
    }
}

/// Per-mode gallon presets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Presets {
    pub fill_gallons: f64,
    pub mix_gallons: f64,
}

impl Presets {
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            fill_gallons: cfg.default_fill_gallons,
            mix_gallons: cfg.default_mix_gallons,
        }
    }

    pub fn for_mode(&self, mode: FillMode) -> f64 {
        match mode {
            FillMode::Fill => self.fill_gallons,
            FillMode::Mix => self.mix_gallons,
        }
    }

    pub fn set(&mut self, mode: FillMode, gallons: f64) {
        match mode {
            FillMode::Fill => self.fill_gallons = gallons,
            FillMode::Mix => self.mix_gallons = gallons,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// FillSession
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FillSession {
    pub requested_gallons: f64,
    pub mode: FillMode,
    pub is_flowing: bool,
    pub alert_already_fired: bool,
    pub override_enabled: bool,
    pub override_enabled_at: Option<Instant>,
    pub pending_result: Option<FillResult>,
    /// Operator acknowledged the on-screen result ("thumbs up").
    pub display_acknowledged: bool,
    pub presets: Presets,
}

impl FillSession {
    /// Fresh session in `mode`, starting from that mode's preset.
    pub fn new(presets: Presets, mode: FillMode) -> Self {
        Self {
            requested_gallons: presets.for_mode(mode),
            mode,
            is_flowing: false,
            alert_already_fired: false,
            override_enabled: false,
            override_enabled_at: None,
            pending_result: None,
            display_acknowledged: false,
            presets,
        }
    }

    /// Add `delta` gallons (floored at zero) and store it as the active
    /// mode's preset.  Returns the new value.
    pub fn adjust_requested(&mut self, delta: f64) -> f64 {
        let gallons = (self.requested_gallons + delta).max(0.0);
        self.requested_gallons = gallons;
        self.presets.set(self.mode, gallons);
        gallons
    }

    /// Save the outgoing preset and load the incoming one.  Returns false
    /// when already in `to`.
    pub fn switch_mode(&mut self, to: FillMode) -> bool {
        if self.mode == to {
            return false;
        }
        self.presets.set(self.mode, self.requested_gallons);
        self.mode = to;
        self.requested_gallons = self.presets.for_mode(to);
        self.display_acknowledged = false;
        true
    }

    /// Flip override.  Returns the new state.
    pub fn toggle_override(&mut self, now: Instant) -> bool {
        self.override_enabled = !self.override_enabled;
        self.override_enabled_at = self.override_enabled.then_some(now);
        self.override_enabled
    }

    pub fn take_pending(&mut self) -> Option<FillResult> {
        self.pending_result.take()
    }
}

// ───────────────────────────────────────────────────────────────
// Presentation-facing modes
// ───────────────────────────────────────────────────────────────

/// Which screen is active.  Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Normal,
    Menu,
    LogViewer,
    FillHistory,
    SelfTest,
    FullTest,
    SystemUpdate,
    Reminders,
    ExitConfirm,
    ResetSeasonConfirm,
}

impl UiMode {
    /// The confirmation dialog this mode represents, if any.
    pub fn dialog(self) -> Option<ModalDialog> {
        match self {
            Self::ExitConfirm => Some(ModalDialog::ExitConfirm),
            Self::ResetSeasonConfirm => Some(ModalDialog::ResetSeasonConfirm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalDialog {
    ExitConfirm,
    ResetSeasonConfirm,
}

/// Checkboxes of the switch-box full test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTest {
    PlusOne,
    MinusOne,
    PlusTen,
    MinusTen,
    PumpStop,
    Override,
}

impl SubTest {
    pub const ALL: [Self; 6] = [
        Self::PlusOne,
        Self::MinusOne,
        Self::PlusTen,
        Self::MinusTen,
        Self::PumpStop,
        Self::Override,
    ];

    pub fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// Bitmask of passed [`SubTest`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullTestProgress(u8);

impl FullTestProgress {
    pub fn mark(&mut self, test: SubTest) {
        self.0 |= test.mask();
    }

    pub fn is_passed(self, test: SubTest) -> bool {
        self.0 & test.mask() != 0
    }

    pub fn all_passed(self) -> bool {
        SubTest::ALL.iter().all(|t| self.is_passed(*t))
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

// ───────────────────────────────────────────────────────────────
// Shared state
// ───────────────────────────────────────────────────────────────

/// Everything the poller, the router and the presentation layer share.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub session: FillSession,
    pub reading: Option<FlowReading>,
    pub link: Option<LinkStatus>,
    pub last_heartbeat_at: Option<Instant>,
    pub menu_cursor: usize,
    pub full_test: FullTestProgress,
    /// Screen the router last dispatched on.
    pub seen_mode: UiMode,
    pub totals: Option<Totals>,
}

impl CoreState {
    /// Record the active screen.  Entering the full test starts it with
    /// every box cleared.
    pub fn observe_mode(&mut self, mode: UiMode) {
        if mode == UiMode::FullTest && self.seen_mode != UiMode::FullTest {
            self.full_test = FullTestProgress::default();
        }
        self.seen_mode = mode;
    }
}

/// Where the fill stands relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBand {
    Below,
    /// Within the warning band under target.
    Warning,
    /// Past the target.
    Over,
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub reading: Option<FlowReading>,
    pub actual_gallons: f64,
    pub flow_rate_gpm: f64,
    pub requested_gallons: f64,
    pub mode: FillMode,
    pub is_flowing: bool,
    pub override_enabled: bool,
    pub alert_already_fired: bool,
    pub pending_result: Option<FillResult>,
    pub display_acknowledged: bool,
    pub band: TargetBand,
    pub heartbeat_ok: bool,
    pub link: Option<LinkStatus>,
    pub totals: Option<Totals>,
}

/// Cloneable handle to the single [`CoreState`].
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<CoreState>>);

impl SharedState {
    pub fn new(session: FillSession) -> Self {
        Self(Arc::new(Mutex::new(CoreState {
            session,
            reading: None,
            link: None,
            last_heartbeat_at: None,
            menu_cursor: 0,
            full_test: FullTestProgress::default(),
            seen_mode: UiMode::Normal,
            totals: None,
        })))
    }

    /// Run `f` with the state locked.  Keep `f` short and I/O free.
    pub fn with<R>(&self, f: impl FnOnce(&mut CoreState) -> R) -> R {
        f(&mut lock(&self.0))
    }

    pub fn session(&self) -> FillSession {
        self.with(|core| core.session.clone())
    }

    /// True if a heartbeat arrived within `timeout` of `now`.
    pub fn heartbeat_ok(&self, now: Instant, timeout: std::time::Duration) -> bool {
        self.with(|core| {
            core.last_heartbeat_at
                .is_some_and(|at| now.saturating_duration_since(at) < timeout)
        })
    }

    pub fn snapshot(&self, now: Instant, cfg: &ControllerConfig) -> StatusSnapshot {
        let heartbeat_ok = self.heartbeat_ok(now, cfg.heartbeat_timeout());
        self.with(|core| {
            let s = &core.session;
            let actual = core.reading.map_or(0.0, |r| r.totalizer_gallons());
            let band = if actual > s.requested_gallons {
                TargetBand::Over
            } else if actual >= s.requested_gallons - cfg.warning_band_gallons {
                TargetBand::Warning
            } else {
                TargetBand::Below
            };
            StatusSnapshot {
                reading: core.reading,
                actual_gallons: actual,
                flow_rate_gpm: core.reading.map_or(0.0, |r| r.flow_rate_gpm()),
                requested_gallons: s.requested_gallons,
                mode: s.mode,
                is_flowing: s.is_flowing,
                override_enabled: s.override_enabled,
                alert_already_fired: s.alert_already_fired,
                pending_result: s.pending_result,
                display_acknowledged: s.display_acknowledged,
                band,
                heartbeat_ok,
                link: core.link,
                totals: core.totals,
            }
        })
    }
}
