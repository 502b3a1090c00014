//! Preset and totals persistence.
//!
//! [`JsonFileStore`] keeps presets and totals in one JSON document
//! (`state.json`, written via temp file + rename) and appends to two
//! plain-text logs:
//!
//! - `fill_history.log`: one line per confirmed fill
//! - `daily_totals.log`: `YYYY-MM-DD: N.NN gallons` when a day rolls over
//!
//! [`MemoryStore`] is the in-process equivalent for tests and headless
//! runs without a data directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};

use crate::app::ports::FillStore;
use crate::error::StoreError;
use crate::session::{FillRecord, Presets, Totals};

const STATE_FILE: &str = "state.json";
const HISTORY_FILE: &str = "fill_history.log";
const DAILY_LOG_FILE: &str = "daily_totals.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoreDoc {
    presets: Option<Presets>,
    totals: Totals,
}

impl StoreDoc {
    fn empty(today: NaiveDate) -> Self {
        Self {
            presets: None,
            totals: Totals::empty(today),
        }
    }

    /// Start a new day.  Returns the finished day's total, if any.
    fn roll_day(&mut self, today: NaiveDate) -> Option<(NaiveDate, f64)> {
        if today <= self.totals.day {
            return None;
        }
        let finished = (self.totals.day, self.totals.daily_gallons);
        info!("STORE | daily reset: {:.2} gal -> 0", finished.1);
        self.totals.day = today;
        self.totals.daily_gallons = 0.0;
        (finished.1 > 0.0).then_some(finished)
    }

    fn add(&mut self, gallons: f64) {
        self.totals.daily_gallons += gallons;
        self.totals.season_gallons += gallons;
    }
}

// ───────────────────────────────────────────────────────────────
// JSON file store
// ───────────────────────────────────────────────────────────────

pub struct JsonFileStore {
    dir: PathBuf,
    doc: StoreDoc,
}

impl JsonFileStore {
    /// Open (or create) the store in `dir`, rolling the daily total over
    /// to today's local date.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_on(dir, Local::now().date_naive())
    }

    pub fn open_on(dir: impl Into<PathBuf>, today: NaiveDate) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let doc = match fs::read_to_string(dir.join(STATE_FILE)) {
            Ok(text) => serde_json::from_str(&text).map_err(|_| StoreError::Corrupted)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("STORE | no state in {}, starting fresh", dir.display());
                StoreDoc::empty(today)
            }
            Err(e) => return Err(e.into()),
        };
        let mut store = Self { dir, doc };
        store.roll_day(today)?;
        Ok(store)
    }

    /// Roll the daily total over if `today` is later than the stored
    /// day.  Returns true if it rolled.
    pub fn roll_day(&mut self, today: NaiveDate) -> Result<bool, StoreError> {
        if today <= self.doc.totals.day {
            return Ok(false);
        }
        if let Some((day, gallons)) = self.doc.roll_day(today) {
            self.append(DAILY_LOG_FILE, &format!("{day}: {gallons:.2} gallons"))?;
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&self.doc).map_err(|_| StoreError::Corrupted)?;
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));
        fs::write(&tmp, text)?;
        fs::rename(&tmp, self.dir.join(STATE_FILE))?;
        Ok(())
    }

    fn append(&self, file: &str, line: &str) -> Result<(), StoreError> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

impl FillStore for JsonFileStore {
    fn load_presets(&mut self) -> Result<Option<Presets>, StoreError> {
        Ok(self.doc.presets)
    }

    fn save_presets(&mut self, presets: &Presets) -> Result<(), StoreError> {
        self.doc.presets = Some(*presets);
        self.persist()
    }

    fn record_fill(&mut self, record: &FillRecord) -> Result<Totals, StoreError> {
        self.roll_day(record.timestamp.date())?;
        self.doc.add(record.actual_gallons);
        self.append(HISTORY_FILE, &record.history_line())?;
        self.persist()?;
        Ok(self.doc.totals)
    }

    fn reset_season(&mut self) -> Result<f64, StoreError> {
        let previous = self.doc.totals.season_gallons;
        self.doc.totals.season_gallons = 0.0;
        self.persist()?;
        Ok(previous)
    }

    fn totals(&self) -> Totals {
        self.doc.totals
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MemoryStore {
    doc: StoreDoc,
    history: Vec<FillRecord>,
}

impl MemoryStore {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            doc: StoreDoc::empty(today),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[FillRecord] {
        &self.history
    }

    pub fn presets(&self) -> Option<Presets> {
        self.doc.presets
    }
}

impl FillStore for MemoryStore {
    fn load_presets(&mut self) -> Result<Option<Presets>, StoreError> {
        Ok(self.doc.presets)
    }

    fn save_presets(&mut self, presets: &Presets) -> Result<(), StoreError> {
        self.doc.presets = Some(*presets);
        Ok(())
    }

    fn record_fill(&mut self, record: &FillRecord) -> Result<Totals, StoreError> {
        self.doc.roll_day(record.timestamp.date());
        self.doc.add(record.actual_gallons);
        self.history.push(record.clone());
        Ok(self.doc.totals)
    }

    fn reset_season(&mut self) -> Result<f64, StoreError> {
        let previous = self.doc.totals.season_gallons;
        self.doc.totals.season_gallons = 0.0;
        Ok(previous)
    }

    fn totals(&self) -> Totals {
        self.doc.totals
    }
}
