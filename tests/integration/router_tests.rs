//! Integration tests: CommandRouter → screen / store / relays.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use tankfill::adapters::headless::HeadlessScreen;
use tankfill::adapters::store::MemoryStore;
use tankfill::app::events::AppEvent;
use tankfill::app::ports::{FillStore, ScreenPort};
use tankfill::config::ControllerConfig;
use tankfill::drivers::relay::{PulseWorker, RelayActuator};
use tankfill::error::StoreError;
use tankfill::router::{Branch, CommandRouter, Routed, RouterSettings, load_session};
use tankfill::safety::{OverrideChange, OverrideReason};
use tankfill::session::{
    FillMode, FillRecord, FillResult, ModalDialog, Presets, SharedState, ShutoffType, SubTest,
    Totals, UiMode,
};

use crate::mock_hw::{RecordingPin, RecordingScreen, ScreenCall, VecSink};

const MENU_LEN: usize = 7;

fn settings() -> RouterSettings {
    RouterSettings {
        pump_stop: Duration::from_millis(1),
        flow_reset_delay: Duration::from_millis(1),
        flow_reset_pulse: Duration::from_millis(1),
    }
}

struct Rig<S, F> {
    router: CommandRouter<S, F>,
    screen: Arc<S>,
    pump_pin: RecordingPin,
    reset_pin: RecordingPin,
    sink: VecSink,
}

impl<S: ScreenPort, F: FillStore> Rig<S, F> {
    fn with(screen: S, mut store: F) -> Self {
        let cfg = ControllerConfig::default();
        let shared = SharedState::new(load_session(&mut store, &cfg));
        let screen = Arc::new(screen);
        let pump_pin = RecordingPin::default();
        let reset_pin = RecordingPin::default();
        let router = CommandRouter::new(
            shared,
            Arc::clone(&screen),
            store,
            PulseWorker::new(Arc::new(RelayActuator::new(pump_pin.clone(), "pump-stop")), "pump-stop"),
            PulseWorker::new(Arc::new(RelayActuator::new(reset_pin.clone(), "flow-reset")), "flow-reset"),
            settings(),
        );
        Self {
            router,
            screen,
            pump_pin,
            reset_pin,
            sink: VecSink::new(),
        }
    }

    fn send(&mut self, line: &str) -> Routed {
        self.router.route(line, Instant::now(), &mut self.sink)
    }

    fn requested(&self) -> f64 {
        self.router.shared().with(|core| core.session.requested_gallons)
    }

    fn set_pending(&self, actual_gallons: f64) {
        self.router.shared().with(|core| {
            core.session.pending_result = Some(FillResult {
                requested_gallons: core.session.requested_gallons,
                actual_gallons,
                shutoff_type: ShutoffType::Auto,
                completed_at: Instant::now(),
            });
        });
    }
}

fn rig() -> Rig<RecordingScreen, MemoryStore> {
    Rig::with(RecordingScreen::new(MENU_LEN), MemoryStore::new(Local::now().date_naive()))
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Store whose fill records always fail.
struct BrokenStore(MemoryStore);

impl FillStore for BrokenStore {
    fn load_presets(&mut self) -> Result<Option<Presets>, StoreError> {
        self.0.load_presets()
    }
    fn save_presets(&mut self, presets: &Presets) -> Result<(), StoreError> {
        self.0.save_presets(presets)
    }
    fn record_fill(&mut self, _record: &FillRecord) -> Result<Totals, StoreError> {
        Err(StoreError::Io(std::io::ErrorKind::PermissionDenied))
    }
    fn reset_season(&mut self) -> Result<f64, StoreError> {
        self.0.reset_season()
    }
    fn totals(&self) -> Totals {
        self.0.totals()
    }
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_is_consumed_on_every_screen() {
    let mut rig = rig();
    rig.screen.set_dialog(Some(ModalDialog::ExitConfirm));
    assert_eq!(rig.send("OK\r\n"), Routed::Handled(Branch::Heartbeat));
    assert!(rig.router.shared().heartbeat_ok(Instant::now(), Duration::from_secs(10)));
    assert!(rig.screen.calls().is_empty(), "heartbeat must not touch the dialog");
}

// ── Dialogs ───────────────────────────────────────────────────

#[test]
fn exit_dialog_swallows_adjustments_and_confirms_on_override() {
    let mut rig = rig();
    rig.screen.set_dialog(Some(ModalDialog::ExitConfirm));

    assert_eq!(rig.send("+1"), Routed::Ignored(Branch::ExitDialog));
    assert_eq!(rig.requested(), 60.0);

    assert_eq!(rig.send("OV"), Routed::Handled(Branch::ExitDialog));
    assert_eq!(rig.screen.calls(), vec![ScreenCall::ConfirmExit]);
    assert!(!rig.router.shared().session().override_enabled);
}

#[test]
fn exit_dialog_mode_is_cancelled_by_pump_stop() {
    let mut rig = rig();
    rig.screen.set_mode(UiMode::ExitConfirm);
    assert_eq!(rig.send("PS"), Routed::Handled(Branch::ExitDialog));
    assert_eq!(rig.screen.calls(), vec![ScreenCall::CloseDialog]);
    assert!(rig.sink.events.is_empty(), "cancel must not stop the pump");
    assert!(rig.pump_pin.levels().iter().all(|high| !high));
}

#[test]
fn exit_dialog_outranks_reset_season_mode() {
    let mut rig = rig();
    rig.screen.set_mode(UiMode::ResetSeasonConfirm);
    rig.screen.set_dialog(Some(ModalDialog::ExitConfirm));
    assert_eq!(rig.send("OV"), Routed::Handled(Branch::ExitDialog));
}

#[test]
fn reset_season_zeroes_season_but_keeps_daily() {
    let mut rig = rig();
    rig.set_pending(58.5);
    rig.send("TU");
    let before = rig.router.shared().with(|core| core.totals).unwrap();
    assert_eq!(before.season_gallons, 58.5);

    rig.screen.set_dialog(Some(ModalDialog::ResetSeasonConfirm));
    assert_eq!(rig.send("OV"), Routed::Handled(Branch::ResetSeasonDialog));

    let after = rig.router.shared().with(|core| core.totals).unwrap();
    assert_eq!(after.season_gallons, 0.0);
    assert_eq!(after.daily_gallons, 58.5);
    assert!(rig.sink.events.contains(&AppEvent::SeasonReset {
        previous_gallons: 58.5
    }));
    assert_eq!(rig.screen.pending_dialog(), None);
}

#[test]
fn reset_season_cancel_leaves_totals() {
    let mut rig = rig();
    rig.set_pending(10.0);
    rig.send("TU");
    rig.screen.set_dialog(Some(ModalDialog::ResetSeasonConfirm));
    assert_eq!(rig.send("PS"), Routed::Handled(Branch::ResetSeasonDialog));
    assert_eq!(rig.router.with_store(|s| s.totals().season_gallons), 10.0);
}

// ── Full-screen views ─────────────────────────────────────────

#[test]
fn reminders_only_answer_override() {
    let mut rig = rig();
    rig.screen.set_mode(UiMode::Reminders);
    assert_eq!(rig.send("PS"), Routed::Ignored(Branch::Reminders));
    assert_eq!(rig.send("OV"), Routed::Handled(Branch::Reminders));
    assert_eq!(rig.screen.calls(), vec![ScreenCall::DismissReminders]);
}

#[test]
fn viewer_scrolls_and_exits() {
    let mut rig = rig();
    rig.screen.set_mode(UiMode::FillHistory);
    rig.send("+1");
    rig.send("-1");
    assert_eq!(rig.send("+10"), Routed::Ignored(Branch::Viewer));
    rig.send("OV");
    assert_eq!(
        rig.screen.calls(),
        vec![ScreenCall::Scroll(1), ScreenCall::Scroll(-1), ScreenCall::ExitScreen]
    );
    assert_eq!(rig.requested(), 60.0);
}

#[test]
fn self_test_and_update_screens_only_exit() {
    let mut rig = rig();
    rig.screen.set_mode(UiMode::SelfTest);
    assert_eq!(rig.send("+1"), Routed::Ignored(Branch::SelfTest));
    assert_eq!(rig.send("OV"), Routed::Handled(Branch::SelfTest));

    rig.screen.set_mode(UiMode::SystemUpdate);
    assert_eq!(rig.send("PS"), Routed::Ignored(Branch::SystemUpdate));
    assert_eq!(rig.send("OV"), Routed::Handled(Branch::SystemUpdate));
}

#[test]
fn full_test_override_is_two_stage() {
    let mut rig = rig();
    rig.screen.set_mode(UiMode::FullTest);

    rig.send("+1");
    rig.send("PS");
    rig.send("OV");
    assert_eq!(
        rig.screen.calls(),
        vec![
            ScreenCall::TestPassed(SubTest::PlusOne),
            ScreenCall::TestPassed(SubTest::PumpStop),
            ScreenCall::TestPassed(SubTest::Override),
        ]
    );
    assert!(rig.sink.events.is_empty(), "test presses must not act");

    assert_eq!(rig.send("OV"), Routed::Handled(Branch::FullTest));
    assert_eq!(rig.screen.calls().last(), Some(&ScreenCall::ExitScreen));
    assert_eq!(rig.router.shared().with(|core| core.full_test.bits()), 0);
}

#[test]
fn menu_cursor_wraps_both_ways() {
    let mut rig = rig();
    rig.screen.set_mode(UiMode::Menu);

    rig.send("-1");
    rig.send("+1");
    rig.send("+1");
    rig.send("OV");
    assert_eq!(
        rig.screen.calls(),
        vec![
            ScreenCall::Highlight(MENU_LEN - 1),
            ScreenCall::Highlight(0),
            ScreenCall::Highlight(1),
            ScreenCall::Activate(1),
        ]
    );
}

// ── Normal mode ───────────────────────────────────────────────

#[test]
fn adjustments_clamp_at_zero_and_persist() {
    let mut rig = rig();
    for _ in 0..7 {
        rig.send("-10");
    }
    assert_eq!(rig.requested(), 0.0);
    let presets = rig.router.with_store(|s| s.presets()).unwrap();
    assert_eq!(presets.fill_gallons, 0.0);
    assert_eq!(
        rig.sink.events.last(),
        Some(&AppEvent::PresetChanged {
            mode: FillMode::Fill,
            gallons: 0.0
        })
    );
}

#[test]
fn override_at_zero_opens_menu() {
    let mut rig = rig();
    for _ in 0..6 {
        rig.send("-10");
    }
    rig.router.shared().with(|core| core.menu_cursor = 4);

    assert_eq!(rig.send("OV"), Routed::Handled(Branch::Normal));
    assert_eq!(rig.screen.calls(), vec![ScreenCall::OpenMenu]);
    assert_eq!(rig.screen.ui_mode(), UiMode::Menu);
    assert_eq!(rig.router.shared().with(|core| core.menu_cursor), 0);
    assert!(!rig.router.shared().session().override_enabled);
}

#[test]
fn override_toggles_when_target_set() {
    let mut rig = rig();
    rig.send("OV");
    let session = rig.router.shared().session();
    assert!(session.override_enabled);
    assert!(session.override_enabled_at.is_some());
    assert_eq!(
        rig.sink.events,
        vec![AppEvent::OverrideChanged(OverrideChange {
            enabled: true,
            reason: OverrideReason::Operator,
        })]
    );

    rig.send("OV");
    assert!(!rig.router.shared().session().override_enabled);
}

#[test]
fn mix_and_fill_keep_separate_presets() {
    let mut rig = rig();
    rig.send("+1");
    rig.send("MIX");
    assert_eq!(rig.requested(), 40.0);
    rig.send("+10");
    rig.send("FILL");
    assert_eq!(rig.requested(), 61.0);

    // Already in FILL: no switch, no event.
    let before = rig.sink.events.len();
    rig.send("FILL");
    assert_eq!(rig.sink.events.len(), before);

    let presets = rig.router.with_store(|s| s.presets()).unwrap();
    assert_eq!(presets.fill_gallons, 61.0);
    assert_eq!(presets.mix_gallons, 50.0);
    assert!(rig.sink.events.contains(&AppEvent::ModeSwitched {
        to: FillMode::Mix,
        requested_gallons: 40.0
    }));
}

#[test]
fn pump_stop_pulses_the_stop_relay() {
    let mut rig = rig();
    assert_eq!(rig.send("PS"), Routed::Handled(Branch::Normal));
    assert_eq!(rig.sink.events, vec![AppEvent::PumpStopRequested]);
    assert!(wait_for(|| rig.pump_pin.levels() == vec![false, true, false]));
}

#[test]
fn unknown_token_is_dropped() {
    let mut rig = rig();
    assert_eq!(rig.send("HELLO"), Routed::Ignored(Branch::Normal));
    assert!(rig.sink.events.is_empty());
}

#[test]
fn thumbs_up_commits_and_schedules_totalizer_reset() {
    let mut rig = rig();
    rig.set_pending(59.9);

    rig.send("TU");
    let session = rig.router.shared().session();
    assert!(session.pending_result.is_none());
    assert!(session.display_acknowledged);
    assert_eq!(rig.router.with_store(|s| s.history().len()), 1);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::FillCommitted { .. })),
        1
    );
    assert!(wait_for(|| rig.reset_pin.pulses() == 1));

    // Nothing pending: a second TU only acknowledges.
    rig.send("TU");
    assert_eq!(rig.router.with_store(|s| s.history().len()), 1);
}

#[test]
fn failed_commit_keeps_result_pending() {
    let store = BrokenStore(MemoryStore::new(Local::now().date_naive()));
    let mut rig = Rig::with(RecordingScreen::new(MENU_LEN), store);
    rig.set_pending(30.0);

    rig.send("TU");
    assert!(rig.router.shared().session().pending_result.is_some());
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::FillCommitted { .. })),
        0
    );
    thread::sleep(Duration::from_millis(20));
    assert_eq!(rig.reset_pin.pulses(), 0);
}

// ── Headless screen end-to-end ────────────────────────────────

#[test]
fn headless_menu_reaches_exit_confirmation() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut rig = Rig::with(
        HeadlessScreen::new(Arc::clone(&shutdown)),
        MemoryStore::new(Local::now().date_naive()),
    );
    for _ in 0..6 {
        rig.send("-10");
    }
    rig.send("OV"); // opens the menu at 0 gal
    assert_eq!(rig.screen.ui_mode(), UiMode::Menu);

    rig.send("-1"); // wraps to the last item: Exit
    assert_eq!(rig.screen.highlighted(), 6);
    rig.send("OV");
    assert_eq!(rig.screen.pending_dialog(), Some(ModalDialog::ExitConfirm));

    rig.send("+10");
    assert!(!shutdown.load(Ordering::Relaxed));
    rig.send("OV");
    assert!(shutdown.load(Ordering::Relaxed));
}

#[test]
fn headless_full_test_restarts_after_leaving_early() {
    let mut rig = Rig::with(
        HeadlessScreen::new(Arc::new(AtomicBool::new(false))),
        MemoryStore::new(Local::now().date_naive()),
    );
    for _ in 0..6 {
        rig.send("-10");
    }
    let enter_full_test = |rig: &mut Rig<HeadlessScreen, MemoryStore>| {
        rig.send("OV");
        assert_eq!(rig.screen.ui_mode(), UiMode::Menu);
        for _ in 0..3 {
            rig.send("+1");
        }
        rig.send("OV");
        assert_eq!(rig.screen.ui_mode(), UiMode::FullTest);
    };

    enter_full_test(&mut rig);
    rig.send("OV"); // ticks the override box
    assert_eq!(rig.screen.ui_mode(), UiMode::FullTest);

    // A reminder pops up over the test and is dismissed.
    rig.screen.show(UiMode::Reminders);
    assert_eq!(rig.send("OV"), Routed::Handled(Branch::Reminders));
    assert_eq!(rig.screen.ui_mode(), UiMode::Normal);

    enter_full_test(&mut rig);
    assert_eq!(rig.send("OV"), Routed::Handled(Branch::FullTest));
    assert_eq!(rig.screen.ui_mode(), UiMode::FullTest, "first OV only ticks the box");
    rig.send("OV");
    assert_eq!(rig.screen.ui_mode(), UiMode::Normal);
}
