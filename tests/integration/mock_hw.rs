//! Mock hardware adapters for integration tests.
//!
//! Records every transport, power, pin and screen call so tests can
//! assert on the full history without touching GPIO, sockets or files.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use tankfill::app::events::AppEvent;
use tankfill::app::ports::{EventSink, PowerLine, ScreenPort, SensorTransport};
use tankfill::error::TransportError;
use tankfill::sensors::LITERS_TO_GALLONS;
use tankfill::sensors::frame::{self, DEFAULT_FRAME_LEN, Frame};
use tankfill::session::{ModalDialog, SubTest, UiMode};

// ── Sensor transport ──────────────────────────────────────────

/// Plays back queued responses; repeats the last one when the queue
/// runs dry.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    queue: Arc<Mutex<VecDeque<Result<Frame, TransportError>>>>,
    last: Arc<Mutex<Option<Result<Frame, TransportError>>>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Result<Frame, TransportError>) {
        self.queue.lock().unwrap().push_back(response);
    }

    /// Queue a meter frame reading `gallons` on the totalizer.
    pub fn push_gallons(&self, gallons: f64, flow_l_per_s: f64) {
        self.push(Ok(meter_frame(gallons, flow_l_per_s)));
    }
}

impl SensorTransport for ScriptedTransport {
    fn exchange(&mut self, _port: u8, _len: usize) -> Result<Frame, TransportError> {
        let next = self.queue.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or(Err(TransportError::Io(std::io::ErrorKind::TimedOut))),
        }
    }
}

/// Frame as the meter would send it (totalizer negated on the wire).
pub fn meter_frame(gallons: f64, flow_l_per_s: f64) -> Frame {
    let liters = gallons / LITERS_TO_GALLONS;
    frame::encode(-(liters as f32), flow_l_per_s as f32, DEFAULT_FRAME_LEN)
}

// ── Power line ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingPower {
    pub calls: Arc<Mutex<Vec<(u8, bool)>>>,
}

#[allow(dead_code)]
impl RecordingPower {
    pub fn calls(&self) -> Vec<(u8, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PowerLine for RecordingPower {
    fn set_power(&mut self, port: u8, on: bool) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push((port, on));
        Ok(())
    }
}

// ── Relay pin ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct PinFault;

impl embedded_hal::digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin that records every level it is driven to.
#[derive(Clone, Default)]
pub struct RecordingPin {
    pub levels: Arc<Mutex<Vec<bool>>>,
}

#[allow(dead_code)]
impl RecordingPin {
    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().unwrap().clone()
    }

    /// Number of completed high pulses.
    pub fn pulses(&self) -> usize {
        self.levels().iter().filter(|high| **high).count()
    }
}

impl ErrorType for RecordingPin {
    type Error = PinFault;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), PinFault> {
        self.levels.lock().unwrap().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), PinFault> {
        self.levels.lock().unwrap().push(true);
        Ok(())
    }
}

// ── Screen ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCall {
    Scroll(i32),
    ExitScreen,
    OpenMenu,
    Highlight(usize),
    Activate(usize),
    ConfirmExit,
    CloseDialog,
    DismissReminders,
    TestPassed(SubTest),
}

/// Screen whose mode and dialog are set by the test.
pub struct RecordingScreen {
    mode: Mutex<UiMode>,
    dialog: Mutex<Option<ModalDialog>>,
    menu_len: usize,
    pub calls: Mutex<Vec<ScreenCall>>,
}

#[allow(dead_code)]
impl RecordingScreen {
    pub fn new(menu_len: usize) -> Self {
        Self {
            mode: Mutex::new(UiMode::Normal),
            dialog: Mutex::new(None),
            menu_len,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: UiMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_dialog(&self, dialog: Option<ModalDialog>) {
        *self.dialog.lock().unwrap() = dialog;
    }

    pub fn calls(&self) -> Vec<ScreenCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ScreenCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ScreenPort for RecordingScreen {
    fn ui_mode(&self) -> UiMode {
        *self.mode.lock().unwrap()
    }

    fn pending_dialog(&self) -> Option<ModalDialog> {
        *self.dialog.lock().unwrap()
    }

    fn menu_len(&self) -> usize {
        self.menu_len
    }

    fn scroll(&self, delta: i32) {
        self.record(ScreenCall::Scroll(delta));
    }

    fn exit_screen(&self) {
        self.set_mode(UiMode::Normal);
        self.record(ScreenCall::ExitScreen);
    }

    fn open_menu(&self) {
        self.set_mode(UiMode::Menu);
        self.record(ScreenCall::OpenMenu);
    }

    fn highlight_menu(&self, index: usize) {
        self.record(ScreenCall::Highlight(index));
    }

    fn activate_menu(&self, index: usize) {
        self.record(ScreenCall::Activate(index));
    }

    fn confirm_exit(&self) {
        self.record(ScreenCall::ConfirmExit);
    }

    fn close_dialog(&self) {
        self.set_dialog(None);
        self.record(ScreenCall::CloseDialog);
    }

    fn dismiss_reminders(&self) {
        self.set_mode(UiMode::Normal);
        self.record(ScreenCall::DismissReminders);
    }

    fn mark_test_passed(&self, test: SubTest) {
        self.record(ScreenCall::TestPassed(test));
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct VecSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
