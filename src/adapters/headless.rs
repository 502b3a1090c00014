//! Headless presentation adapter.
//!
//! Stands in for the touchscreen on deployments without a display: it
//! tracks the active view and a fixed menu so switch-box navigation still
//! works, and logs what a screen would have shown.  Confirming the exit
//! dialog raises the shutdown flag handed to [`HeadlessScreen::new`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::info;

use crate::app::ports::ScreenPort;
use crate::session::{FullTestProgress, ModalDialog, SubTest, UiMode, lock};

/// Menu entries, in display order.
pub const MENU_ITEMS: [MenuItem; 7] = [
    MenuItem::FillHistory,
    MenuItem::LogViewer,
    MenuItem::SelfTest,
    MenuItem::FullTest,
    MenuItem::SystemUpdate,
    MenuItem::ResetSeason,
    MenuItem::Exit,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    FillHistory,
    LogViewer,
    SelfTest,
    FullTest,
    SystemUpdate,
    ResetSeason,
    Exit,
}

#[derive(Debug)]
struct View {
    mode: UiMode,
    dialog: Option<ModalDialog>,
    highlighted: usize,
    scroll: i64,
    tests: FullTestProgress,
}

#[derive(Debug)]
pub struct HeadlessScreen {
    view: Mutex<View>,
    shutdown: Arc<AtomicBool>,
}

impl HeadlessScreen {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            view: Mutex::new(View {
                mode: UiMode::Normal,
                dialog: None,
                highlighted: 0,
                scroll: 0,
                tests: FullTestProgress::default(),
            }),
            shutdown,
        }
    }

    /// Switch view directly (reminder pop-ups, external triggers).
    pub fn show(&self, mode: UiMode) {
        lock(&self.view).mode = mode;
    }

    pub fn highlighted(&self) -> usize {
        lock(&self.view).highlighted
    }
}

impl ScreenPort for HeadlessScreen {
    fn ui_mode(&self) -> UiMode {
        lock(&self.view).mode
    }

    fn pending_dialog(&self) -> Option<ModalDialog> {
        lock(&self.view).dialog
    }

    fn menu_len(&self) -> usize {
        MENU_ITEMS.len()
    }

    fn scroll(&self, delta: i32) {
        let mut v = lock(&self.view);
        v.scroll = (v.scroll + i64::from(delta)).max(0);
    }

    fn exit_screen(&self) {
        let mut v = lock(&self.view);
        v.mode = UiMode::Normal;
        v.scroll = 0;
        v.tests = FullTestProgress::default();
    }

    fn open_menu(&self) {
        let mut v = lock(&self.view);
        v.mode = UiMode::Menu;
        v.highlighted = 0;
    }

    fn highlight_menu(&self, index: usize) {
        lock(&self.view).highlighted = index;
    }

    fn activate_menu(&self, index: usize) {
        let Some(item) = MENU_ITEMS.get(index).copied() else {
            return;
        };
        info!("SCREEN | menu: {item:?}");
        let mut v = lock(&self.view);
        match item {
            MenuItem::FillHistory => v.mode = UiMode::FillHistory,
            MenuItem::LogViewer => v.mode = UiMode::LogViewer,
            MenuItem::SelfTest => v.mode = UiMode::SelfTest,
            MenuItem::FullTest => {
                v.tests = FullTestProgress::default();
                v.mode = UiMode::FullTest;
            }
            MenuItem::SystemUpdate => v.mode = UiMode::SystemUpdate,
            MenuItem::ResetSeason => v.dialog = Some(ModalDialog::ResetSeasonConfirm),
            MenuItem::Exit => v.dialog = Some(ModalDialog::ExitConfirm),
        }
    }

    fn confirm_exit(&self) {
        info!("SCREEN | exit confirmed, shutting down");
        lock(&self.view).dialog = None;
        self.shutdown.store(true, Ordering::Relaxed);
    }

    fn close_dialog(&self) {
        let mut v = lock(&self.view);
        v.dialog = None;
        v.mode = UiMode::Normal;
    }

    fn dismiss_reminders(&self) {
        lock(&self.view).mode = UiMode::Normal;
    }

    fn mark_test_passed(&self, test: SubTest) {
        let mut v = lock(&self.view);
        v.tests.mark(test);
        info!("SCREEN | full test: {test:?} passed (0b{:06b})", v.tests.bits());
    }
}
