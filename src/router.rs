//! Priority-ordered command router.
//!
//! Every line from the switch box or the app goes through
//! [`CommandRouter::route`].  The active screen picks the dispatch table;
//! the first matching branch consumes the token:
//!
//! ```text
//!  OK ──▶ heartbeat
//!  exit dialog ──▶ reset-season dialog ──▶ Reminders ──▶ LogViewer/FillHistory
//!  ──▶ SelfTest ──▶ FullTest ──▶ SystemUpdate ──▶ Menu ──▶ Normal
//! ```
//!
//! Tokens a branch does not recognise are logged and dropped.  The
//! session lock is only held for single updates; store writes, screen
//! calls and relay pulses run after it is released.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Local;
use log::{debug, error, info, warn};

use crate::app::commands::Token;
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, FillStore, ScreenPort};
use crate::config::ControllerConfig;
use crate::drivers::relay::PulseWorker;
use crate::safety::{OverrideChange, OverrideReason};
use crate::session::{
    FillMode, FillRecord, FillSession, ModalDialog, Presets, SharedState, SubTest, Totals, UiMode,
    lock,
};

/// Dispatch table that consumed (or dropped) a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Heartbeat,
    ExitDialog,
    ResetSeasonDialog,
    Reminders,
    Viewer,
    SelfTest,
    FullTest,
    SystemUpdate,
    Menu,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// The branch acted on the token.
    Handled(Branch),
    /// The branch did not recognise the token; nothing changed.
    Ignored(Branch),
}

/// Relay timings the router needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    pub pump_stop: Duration,
    pub flow_reset_delay: Duration,
    pub flow_reset_pulse: Duration,
}

impl RouterSettings {
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            pump_stop: cfg.pump_stop(),
            flow_reset_delay: cfg.flow_reset_delay(),
            flow_reset_pulse: cfg.flow_reset_pulse(),
        }
    }
}

/// Build the startup session from stored presets, falling back to the
/// configured defaults.
pub fn load_session<F: FillStore>(store: &mut F, cfg: &ControllerConfig) -> FillSession {
    let presets = match store.load_presets() {
        Ok(Some(p)) => p,
        Ok(None) => Presets::from_config(cfg),
        Err(e) => {
            warn!("ROUTER | presets unreadable ({e}), using defaults");
            Presets::from_config(cfg)
        }
    };
    FillSession::new(presets, FillMode::Fill)
}

pub struct CommandRouter<S, F> {
    shared: SharedState,
    screen: Arc<S>,
    store: Mutex<F>,
    pump_stop: PulseWorker,
    flow_reset: PulseWorker,
    settings: RouterSettings,
}

impl<S: ScreenPort, F: FillStore> CommandRouter<S, F> {
    pub fn new(
        shared: SharedState,
        screen: Arc<S>,
        store: F,
        pump_stop: PulseWorker,
        flow_reset: PulseWorker,
        settings: RouterSettings,
    ) -> Self {
        let totals = store.totals();
        shared.with(|core| core.totals = Some(totals));
        Self {
            shared,
            screen,
            store: Mutex::new(store),
            pump_stop,
            flow_reset,
            settings,
        }
    }

    /// Route one line received at `now`.
    pub fn route(&self, line: &str, now: Instant, sink: &mut impl EventSink) -> Routed {
        let token = Token::parse(line);

        if token == Token::Heartbeat {
            self.shared.with(|core| core.last_heartbeat_at = Some(now));
            return Routed::Handled(Branch::Heartbeat);
        }

        let mode = self.screen.ui_mode();
        self.shared.with(|core| core.observe_mode(mode));
        let dialog = self.screen.pending_dialog().or_else(|| mode.dialog());

        let routed = match (dialog, mode) {
            (Some(ModalDialog::ExitConfirm), _) => self.exit_dialog(&token),
            (Some(ModalDialog::ResetSeasonConfirm), _) => self.reset_season_dialog(&token, sink),
            (None, UiMode::Reminders) => self.reminders(&token),
            (None, UiMode::LogViewer | UiMode::FillHistory) => self.viewer(&token),
            (None, UiMode::SelfTest) => self.exit_only(&token, Branch::SelfTest),
            (None, UiMode::FullTest) => self.full_test(&token),
            (None, UiMode::SystemUpdate) => self.exit_only(&token, Branch::SystemUpdate),
            (None, UiMode::Menu) => self.menu(&token),
            (None, _) => self.normal(&token, now, sink),
        };

        if let Routed::Ignored(branch) = routed {
            debug!("ROUTER | {branch:?}: dropped '{}'", token.as_str());
        }
        routed
    }

    // ── Entry points for the presentation layer ──────────────

    /// Commit the pending fill, if any, to the totals.
    ///
    /// On success the flow-meter totalizer reset is scheduled.  If the
    /// store fails the result stays pending so it can be confirmed again.
    pub fn confirm_pending_fill(&self, sink: &mut impl EventSink) -> Option<Totals> {
        let result = self.shared.with(|core| core.session.take_pending())?;
        let record = FillRecord::new(&result, Local::now().naive_local());

        let recorded = lock(&self.store).record_fill(&record);
        match recorded {
            Ok(totals) => {
                self.shared.with(|core| core.totals = Some(totals));
                info!("FILL | committed: {}", record.history_line());
                sink.emit(&AppEvent::FillCommitted { result, totals });
                if !self
                    .flow_reset
                    .fire_after(self.settings.flow_reset_delay, self.settings.flow_reset_pulse)
                {
                    info!("FILL | totalizer reset already scheduled");
                }
                Some(totals)
            }
            Err(e) => {
                error!("FILL | failed to record fill: {e}");
                self.shared.with(|core| {
                    if core.session.pending_result.is_none() {
                        core.session.pending_result = Some(result);
                    }
                });
                None
            }
        }
    }

    /// Open the settings menu with the first item highlighted.
    pub fn open_menu(&self) {
        self.shared.with(|core| core.menu_cursor = 0);
        self.screen.open_menu();
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Run `f` against the store (diagnostics and tests).
    pub fn with_store<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        f(&mut lock(&self.store))
    }

    // ── Modal dialogs ─────────────────────────────────────────

    fn exit_dialog(&self, token: &Token) -> Routed {
        match token {
            Token::Override => {
                info!("ROUTER | exit confirmed");
                self.screen.confirm_exit();
            }
            Token::PumpStop => self.screen.close_dialog(),
            _ => return Routed::Ignored(Branch::ExitDialog),
        }
        Routed::Handled(Branch::ExitDialog)
    }

    fn reset_season_dialog(&self, token: &Token, sink: &mut impl EventSink) -> Routed {
        match token {
            Token::Override => {
                let reset = lock(&self.store).reset_season();
                match reset {
                    Ok(previous_gallons) => {
                        let totals = lock(&self.store).totals();
                        self.shared.with(|core| core.totals = Some(totals));
                        info!("ROUTER | season total reset (was {previous_gallons:.1} gal)");
                        sink.emit(&AppEvent::SeasonReset { previous_gallons });
                    }
                    Err(e) => error!("ROUTER | season reset failed: {e}"),
                }
                self.screen.close_dialog();
            }
            Token::PumpStop => self.screen.close_dialog(),
            _ => return Routed::Ignored(Branch::ResetSeasonDialog),
        }
        Routed::Handled(Branch::ResetSeasonDialog)
    }

    // ── Full-screen views ─────────────────────────────────────

    fn reminders(&self, token: &Token) -> Routed {
        if *token == Token::Override {
            self.screen.dismiss_reminders();
            return Routed::Handled(Branch::Reminders);
        }
        Routed::Ignored(Branch::Reminders)
    }

    fn viewer(&self, token: &Token) -> Routed {
        match token {
            Token::PlusOne => self.screen.scroll(1),
            Token::MinusOne => self.screen.scroll(-1),
            Token::Override => self.screen.exit_screen(),
            _ => return Routed::Ignored(Branch::Viewer),
        }
        Routed::Handled(Branch::Viewer)
    }

    fn exit_only(&self, token: &Token, branch: Branch) -> Routed {
        if *token == Token::Override {
            self.screen.exit_screen();
            return Routed::Handled(branch);
        }
        Routed::Ignored(branch)
    }

    fn full_test(&self, token: &Token) -> Routed {
        let test = match token {
            Token::PlusOne => SubTest::PlusOne,
            Token::MinusOne => SubTest::MinusOne,
            Token::PlusTen => SubTest::PlusTen,
            Token::MinusTen => SubTest::MinusTen,
            Token::PumpStop => SubTest::PumpStop,
            Token::Override => SubTest::Override,
            _ => return Routed::Ignored(Branch::FullTest),
        };

        // OV is two-stage: first press ticks its box, second press exits.
        let exit = self.shared.with(|core| {
            if test == SubTest::Override && core.full_test.is_passed(SubTest::Override) {
                core.full_test = Default::default();
                true
            } else {
                core.full_test.mark(test);
                false
            }
        });

        if exit {
            info!("ROUTER | full test finished");
            self.screen.exit_screen();
        } else {
            self.screen.mark_test_passed(test);
        }
        Routed::Handled(Branch::FullTest)
    }

    fn menu(&self, token: &Token) -> Routed {
        let len = self.screen.menu_len();
        if len == 0 {
            return Routed::Ignored(Branch::Menu);
        }
        let step = match token {
            Token::PlusOne => 1,
            Token::MinusOne => len - 1,
            Token::Override => {
                let index = self.shared.with(|core| core.menu_cursor.min(len - 1));
                self.screen.activate_menu(index);
                let entered = self.screen.ui_mode();
                self.shared.with(|core| core.observe_mode(entered));
                return Routed::Handled(Branch::Menu);
            }
            _ => return Routed::Ignored(Branch::Menu),
        };
        let index = self.shared.with(|core| {
            core.menu_cursor = (core.menu_cursor % len + step) % len;
            core.menu_cursor
        });
        self.screen.highlight_menu(index);
        Routed::Handled(Branch::Menu)
    }

    // ── Normal mode ───────────────────────────────────────────

    fn normal(&self, token: &Token, now: Instant, sink: &mut impl EventSink) -> Routed {
        if let Some(delta) = token.gallon_delta() {
            let (mode, gallons, presets) = self.shared.with(|core| {
                let gallons = core.session.adjust_requested(delta);
                (core.session.mode, gallons, core.session.presets)
            });
            self.save_presets(&presets);
            sink.emit(&AppEvent::PresetChanged { mode, gallons });
            return Routed::Handled(Branch::Normal);
        }

        match token {
            Token::PumpStop => {
                info!("ROUTER | manual pump stop");
                sink.emit(&AppEvent::PumpStopRequested);
                self.pump_stop.fire(self.settings.pump_stop);
            }
            Token::Override => {
                let toggled = self.shared.with(|core| {
                    (core.session.requested_gallons != 0.0)
                        .then(|| core.session.toggle_override(now))
                });
                match toggled {
                    None => self.open_menu(),
                    Some(enabled) => {
                        info!("ROUTER | override {}", if enabled { "ON" } else { "OFF" });
                        sink.emit(&AppEvent::OverrideChanged(OverrideChange {
                            enabled,
                            reason: OverrideReason::Operator,
                        }));
                    }
                }
            }
            Token::ThumbsUp => {
                self.shared.with(|core| core.session.display_acknowledged = true);
                self.confirm_pending_fill(sink);
            }
            Token::Mix | Token::Fill => {
                let to = if *token == Token::Mix {
                    FillMode::Mix
                } else {
                    FillMode::Fill
                };
                let switched = self.shared.with(|core| {
                    core.session
                        .switch_mode(to)
                        .then(|| (core.session.requested_gallons, core.session.presets))
                });
                if let Some((requested_gallons, presets)) = switched {
                    self.save_presets(&presets);
                    info!("ROUTER | mode {to}, requested {requested_gallons:.0} gal");
                    sink.emit(&AppEvent::ModeSwitched {
                        to,
                        requested_gallons,
                    });
                }
            }
            _ => return Routed::Ignored(Branch::Normal),
        }
        Routed::Handled(Branch::Normal)
    }

    fn save_presets(&self, presets: &Presets) {
        let saved = lock(&self.store).save_presets(presets);
        if let Err(e) = saved {
            error!("ROUTER | failed to save presets: {e}");
        }
    }
}
