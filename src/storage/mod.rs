//! Event storage
//!
//! Defines the record shape handed to storage and the interface stores
//! implement. The sink in front of a store owns retry and backlog handling.

pub mod memory;
pub mod sink;
pub mod sqlite;

use crate::capture::types::Category;
use crate::display::geometry::ScreenGeometry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sink::{EventSink, FlushReport};
pub use sqlite::SqliteStore;

/// Errors that can occur in storage
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    #[error("No session with id {0}")]
    UnknownSession(i64),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Partial batch write: the first `written` records are stored
#[derive(Error, Debug)]
#[error("Wrote {written} records before failing: {source}")]
pub struct BatchError {
    pub written: usize,
    #[source]
    pub source: StoreError,
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayRange {
    /// Range covering both days, in whichever order given
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Category-specific columns of a stored event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordFields {
    Mouse {
        x: f64,
        y: f64,
        display: usize,
        button: Option<u8>,
        dx: Option<f64>,
        dy: Option<f64>,
    },
    Key {
        key: String,
        realkey: String,
    },
}

/// One reduced event as written to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub category: Category,
    /// UNIX time in seconds
    pub stamp: f64,
    pub day: NaiveDate,
    /// Executable of the foreground program, when known
    pub program: Option<String>,
    pub fields: RecordFields,
}

/// Lifecycle entries of the `app_events` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEvent {
    Start,
    Stop,
}

impl AppEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEvent::Start => "start",
            AppEvent::Stop => "stop",
        }
    }
}

/// Named span of recording time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: i64,
    pub name: String,
    pub start: f64,
    /// Unset while the session is still running
    pub end: Option<f64>,
    pub day1: NaiveDate,
    pub day2: Option<NaiveDate>,
}

impl RecordingSession {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whether an event stamp falls inside the session
    pub fn contains(&self, stamp: f64) -> bool {
        stamp >= self.start && self.end.map_or(true, |end| stamp < end)
    }

    /// Closed sessions lying entirely inside `range`; every session without one
    pub fn within(&self, range: Option<DayRange>) -> bool {
        match (range, self.day2) {
            (None, _) => true,
            (Some(range), Some(day2)) => range.start <= self.day1 && day2 <= range.end,
            (Some(_), None) => false,
        }
    }
}

/// Append-capable store of reduced events
pub trait EventStore: Send {
    /// Insert records in order, also bumping per-day counts.
    ///
    /// On failure reports how many leading records were stored.
    fn insert_batch(&mut self, records: &[Record]) -> Result<(), BatchError>;

    /// Stored events of a category, oldest first
    fn records(&self, category: Category, range: Option<DayRange>) -> StoreResult<Vec<Record>>;

    /// Per-day event counts of a category
    fn day_counts(&self, category: Category) -> StoreResult<BTreeMap<NaiveDate, u64>>;

    /// Delete events of the given categories, returning how many were removed.
    ///
    /// Closed sessions inside the range that no longer hold any event are
    /// deleted too.
    fn clear(&mut self, categories: &[Category], range: Option<DayRange>) -> StoreResult<u64>;

    fn insert_screen_sizes(&mut self, snapshots: &[ScreenGeometry]) -> StoreResult<()>;

    /// All stored display snapshots, oldest first
    fn screen_sizes(&self) -> StoreResult<Vec<ScreenGeometry>>;

    fn insert_app_event(&mut self, event: AppEvent, stamp: f64) -> StoreResult<()>;

    /// Reclaim unused space
    fn vacuum(&mut self) -> StoreResult<()>;

    /// Close any running session and open a new one, returning its id
    fn start_session(&mut self, name: &str, stamp: f64) -> StoreResult<i64>;

    /// Close the running session, returning its id if there was one
    fn stop_session(&mut self, stamp: f64) -> StoreResult<Option<i64>>;

    fn rename_session(&mut self, id: i64, name: &str) -> StoreResult<()>;

    /// Remove a session entry, keeping its events
    fn delete_session(&mut self, id: i64) -> StoreResult<()>;

    /// All sessions, oldest first
    fn sessions(&self) -> StoreResult<Vec<RecordingSession>>;

    /// Delete events of the given categories recorded during a session,
    /// lowering per-day counts to match
    fn clear_session(&mut self, categories: &[Category], id: i64) -> StoreResult<u64>;
}

impl<S: EventStore + ?Sized> EventStore for Box<S> {
    fn insert_batch(&mut self, records: &[Record]) -> Result<(), BatchError> {
        (**self).insert_batch(records)
    }

    fn records(&self, category: Category, range: Option<DayRange>) -> StoreResult<Vec<Record>> {
        (**self).records(category, range)
    }

    fn day_counts(&self, category: Category) -> StoreResult<BTreeMap<NaiveDate, u64>> {
        (**self).day_counts(category)
    }

    fn clear(&mut self, categories: &[Category], range: Option<DayRange>) -> StoreResult<u64> {
        (**self).clear(categories, range)
    }

    fn insert_screen_sizes(&mut self, snapshots: &[ScreenGeometry]) -> StoreResult<()> {
        (**self).insert_screen_sizes(snapshots)
    }

    fn screen_sizes(&self) -> StoreResult<Vec<ScreenGeometry>> {
        (**self).screen_sizes()
    }

    fn insert_app_event(&mut self, event: AppEvent, stamp: f64) -> StoreResult<()> {
        (**self).insert_app_event(event, stamp)
    }

    fn vacuum(&mut self) -> StoreResult<()> {
        (**self).vacuum()
    }

    fn start_session(&mut self, name: &str, stamp: f64) -> StoreResult<i64> {
        (**self).start_session(name, stamp)
    }

    fn stop_session(&mut self, stamp: f64) -> StoreResult<Option<i64>> {
        (**self).stop_session(stamp)
    }

    fn rename_session(&mut self, id: i64, name: &str) -> StoreResult<()> {
        (**self).rename_session(id, name)
    }

    fn delete_session(&mut self, id: i64) -> StoreResult<()> {
        (**self).delete_session(id)
    }

    fn sessions(&self) -> StoreResult<Vec<RecordingSession>> {
        (**self).sessions()
    }

    fn clear_session(&mut self, categories: &[Category], id: i64) -> StoreResult<u64> {
        (**self).clear_session(categories, id)
    }
}
