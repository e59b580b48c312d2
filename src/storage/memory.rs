//! In-memory store
//!
//! Clones share the same data, so a host or test can keep a handle for
//! inspection while the listener owns another.

use crate::capture::types::{stamp_to_day, Category};
use crate::display::geometry::ScreenGeometry;
use crate::storage::{
    AppEvent, BatchError, DayRange, EventStore, Record, RecordingSession, StoreError,
    StoreResult,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryData {
    records: BTreeMap<Category, Vec<Record>>,
    counts: BTreeMap<(Category, NaiveDate), u64>,
    screen_sizes: Vec<ScreenGeometry>,
    app_events: Vec<(AppEvent, f64)>,
    sessions: Vec<RecordingSession>,
    last_session_id: i64,
    /// Writes fail while set
    unavailable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail until reset, e.g. to simulate a full disk
    pub fn set_unavailable(&self, unavailable: bool) {
        self.data.lock().unavailable = unavailable;
    }

    pub fn len(&self, category: Category) -> usize {
        self.data.lock().records.get(&category).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().records.values().all(Vec::is_empty)
    }

    pub fn app_events(&self) -> Vec<(AppEvent, f64)> {
        self.data.lock().app_events.clone()
    }

    fn check(data: &MemoryData) -> StoreResult<()> {
        if data.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }

    fn close_open_sessions(data: &mut MemoryData, stamp: f64) -> Option<i64> {
        let mut closed = None;
        for session in data.sessions.iter_mut().filter(|s| s.is_open()) {
            session.end = Some(stamp);
            session.day2 = Some(stamp_to_day(stamp));
            closed = Some(session.id);
        }
        closed
    }

    fn session_mut(data: &mut MemoryData, id: i64) -> StoreResult<&mut RecordingSession> {
        data.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::UnknownSession(id))
    }
}

impl EventStore for MemoryStore {
    fn insert_batch(&mut self, records: &[Record]) -> Result<(), BatchError> {
        let mut data = self.data.lock();
        Self::check(&data).map_err(|source| BatchError { written: 0, source })?;
        for record in records {
            data.records
                .entry(record.category)
                .or_default()
                .push(record.clone());
            *data.counts.entry((record.category, record.day)).or_default() += 1;
        }
        Ok(())
    }

    fn records(&self, category: Category, range: Option<DayRange>) -> StoreResult<Vec<Record>> {
        let data = self.data.lock();
        Ok(data
            .records
            .get(&category)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| range.map_or(true, |range| range.contains(r.day)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn day_counts(&self, category: Category) -> StoreResult<BTreeMap<NaiveDate, u64>> {
        let data = self.data.lock();
        Ok(data
            .counts
            .iter()
            .filter(|((c, _), _)| *c == category)
            .map(|((_, day), count)| (*day, *count))
            .collect())
    }

    fn clear(&mut self, categories: &[Category], range: Option<DayRange>) -> StoreResult<u64> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        let in_range = |day: NaiveDate| range.map_or(true, |range| range.contains(day));

        let mut deleted = 0;
        for category in categories {
            if let Some(records) = data.records.get_mut(category) {
                let before = records.len();
                records.retain(|r| !in_range(r.day));
                deleted += (before - records.len()) as u64;
            }
        }
        data.counts
            .retain(|(c, day), _| !(categories.contains(c) && in_range(*day)));

        if deleted > 0 {
            let MemoryData {
                records, sessions, ..
            } = &mut *data;
            sessions.retain(|session| {
                session.is_open()
                    || !session.within(range)
                    || records
                        .values()
                        .flatten()
                        .any(|record| session.contains(record.stamp))
            });
        }
        Ok(deleted)
    }

    fn insert_screen_sizes(&mut self, snapshots: &[ScreenGeometry]) -> StoreResult<()> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        data.screen_sizes.extend_from_slice(snapshots);
        Ok(())
    }

    fn screen_sizes(&self) -> StoreResult<Vec<ScreenGeometry>> {
        Ok(self.data.lock().screen_sizes.clone())
    }

    fn insert_app_event(&mut self, event: AppEvent, stamp: f64) -> StoreResult<()> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        data.app_events.push((event, stamp));
        Ok(())
    }

    fn vacuum(&mut self) -> StoreResult<()> {
        let mut data = self.data.lock();
        for records in data.records.values_mut() {
            records.shrink_to_fit();
        }
        Ok(())
    }

    fn start_session(&mut self, name: &str, stamp: f64) -> StoreResult<i64> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        Self::close_open_sessions(&mut data, stamp);
        data.last_session_id += 1;
        let id = data.last_session_id;
        data.sessions.push(RecordingSession {
            id,
            name: name.to_string(),
            start: stamp,
            end: None,
            day1: stamp_to_day(stamp),
            day2: None,
        });
        Ok(id)
    }

    fn stop_session(&mut self, stamp: f64) -> StoreResult<Option<i64>> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        Ok(Self::close_open_sessions(&mut data, stamp))
    }

    fn rename_session(&mut self, id: i64, name: &str) -> StoreResult<()> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        Self::session_mut(&mut data, id)?.name = name.to_string();
        Ok(())
    }

    fn delete_session(&mut self, id: i64) -> StoreResult<()> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        let before = data.sessions.len();
        data.sessions.retain(|s| s.id != id);
        if data.sessions.len() == before {
            return Err(StoreError::UnknownSession(id));
        }
        Ok(())
    }

    fn sessions(&self) -> StoreResult<Vec<RecordingSession>> {
        Ok(self.data.lock().sessions.clone())
    }

    fn clear_session(&mut self, categories: &[Category], id: i64) -> StoreResult<u64> {
        let mut data = self.data.lock();
        Self::check(&data)?;
        let session = Self::session_mut(&mut data, id)?.clone();

        let mut deleted = 0;
        let mut per_day: BTreeMap<(Category, NaiveDate), u64> = BTreeMap::new();
        for category in categories {
            if let Some(records) = data.records.get_mut(category) {
                records.retain(|r| {
                    if session.contains(r.stamp) {
                        *per_day.entry((r.category, r.day)).or_default() += 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }
        for (key, removed) in per_day {
            deleted += removed;
            if let Some(count) = data.counts.get_mut(&key) {
                *count = count.saturating_sub(removed);
            }
        }
        Ok(deleted)
    }
}
