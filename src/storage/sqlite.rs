//! SQLite store
//!
//! One table per event category, plus per-day counts, display snapshots,
//! programs, named sessions and listener lifecycle events. Days are stored as
//! `YYYY-MM-DD` text so range filters compare lexicographically.

use crate::capture::types::{stamp_to_day, Category};
use crate::display::geometry::{ScreenGeometry, ScreenRect};
use crate::storage::{
    AppEvent, BatchError, DayRange, EventStore, Record, RecordFields, RecordingSession, StoreError,
    StoreResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const DAY_FORMAT: &str = "%Y-%m-%d";

const CREATE_TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS programs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE COLLATE NOCASE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS moves (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stamp REAL NOT NULL,
        day TEXT NOT NULL,
        fk_program INTEGER REFERENCES programs(id),
        x INTEGER NOT NULL,
        y INTEGER NOT NULL,
        display INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS clicks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stamp REAL NOT NULL,
        day TEXT NOT NULL,
        fk_program INTEGER REFERENCES programs(id),
        x INTEGER NOT NULL,
        y INTEGER NOT NULL,
        display INTEGER NOT NULL DEFAULT 0,
        button INTEGER
    )"#,
    r#"CREATE TABLE IF NOT EXISTS scrolls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stamp REAL NOT NULL,
        day TEXT NOT NULL,
        fk_program INTEGER REFERENCES programs(id),
        x INTEGER NOT NULL,
        y INTEGER NOT NULL,
        display INTEGER NOT NULL DEFAULT 0,
        dx REAL,
        dy REAL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS keys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stamp REAL NOT NULL,
        day TEXT NOT NULL,
        fk_program INTEGER REFERENCES programs(id),
        key TEXT NOT NULL,
        realkey TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS combos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stamp REAL NOT NULL,
        day TEXT NOT NULL,
        fk_program INTEGER REFERENCES programs(id),
        key TEXT NOT NULL,
        realkey TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS counts (
        type TEXT NOT NULL,
        day TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (type, day)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS screen_sizes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stamp REAL NOT NULL,
        display INTEGER NOT NULL,
        x INTEGER NOT NULL,
        y INTEGER NOT NULL,
        w INTEGER NOT NULL,
        h INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS app_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stamp REAL NOT NULL,
        type TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        start REAL NOT NULL,
        "end" REAL,
        day1 TEXT NOT NULL,
        day2 TEXT
    )"#,
];

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_moves_day ON moves(day)",
    "CREATE INDEX IF NOT EXISTS idx_clicks_day ON clicks(day)",
    "CREATE INDEX IF NOT EXISTS idx_scrolls_day ON scrolls(day)",
    "CREATE INDEX IF NOT EXISTS idx_keys_day ON keys(day)",
    "CREATE INDEX IF NOT EXISTS idx_combos_day ON combos(day)",
];

const SESSION_COLUMNS: &str = r#"id, name, start, "end", day1, day2"#;

pub struct SqliteStore {
    conn: Connection,
    /// Program ids by lowercased executable path
    program_ids: HashMap<String, i64>,
}

impl SqliteStore {
    /// Open or create the database file. Failure here is fatal for a listener.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        for statement in CREATE_TABLES.iter().chain(CREATE_INDEXES) {
            conn.execute(statement, [])?;
        }
        let program_ids = {
            let mut stmt = conn.prepare("SELECT path, id FROM programs")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?.to_lowercase(), row.get(1)?)))?
                .collect::<Result<HashMap<_, _>, _>>()?;
            rows
        };
        tracing::debug!("Storage schema ready, {} known programs", program_ids.len());
        Ok(Self { conn, program_ids })
    }

    /// Id of a program row, inserting it on first sight
    fn program_id(
        tx: &Transaction<'_>,
        known: &mut HashMap<String, i64>,
        path: &str,
    ) -> StoreResult<i64> {
        let key = path.to_lowercase();
        if let Some(id) = known.get(&key) {
            return Ok(*id);
        }
        tx.execute("INSERT OR IGNORE INTO programs (path) VALUES (?1)", params![path])?;
        let id: i64 = tx.query_row(
            "SELECT id FROM programs WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        known.insert(key, id);
        Ok(id)
    }

    fn insert_record(
        tx: &Transaction<'_>,
        known: &mut HashMap<String, i64>,
        record: &Record,
    ) -> StoreResult<()> {
        let table = record.category.as_str();
        let day = record.day.format(DAY_FORMAT).to_string();
        let program = match &record.program {
            Some(path) => Some(Self::program_id(tx, known, path)?),
            None => None,
        };
        match &record.fields {
            RecordFields::Mouse {
                x,
                y,
                display,
                button,
                dx,
                dy,
            } => {
                let (x, y, display) = (x.round() as i64, y.round() as i64, *display as i64);
                match record.category {
                    Category::Clicks => tx.execute(
                        "INSERT INTO clicks (stamp, day, fk_program, x, y, display, button) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![record.stamp, day, program, x, y, display, button],
                    )?,
                    Category::Scrolls => tx.execute(
                        "INSERT INTO scrolls (stamp, day, fk_program, x, y, display, dx, dy) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![record.stamp, day, program, x, y, display, dx, dy],
                    )?,
                    _ => tx.execute(
                        &format!(
                            "INSERT INTO {} (stamp, day, fk_program, x, y, display) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            table
                        ),
                        params![record.stamp, day, program, x, y, display],
                    )?,
                };
            }
            RecordFields::Key { key, realkey } => {
                tx.execute(
                    &format!(
                        "INSERT INTO {} (stamp, day, fk_program, key, realkey) VALUES (?1, ?2, ?3, ?4, ?5)",
                        table
                    ),
                    params![record.stamp, day, program, key, realkey],
                )?;
            }
        }
        tx.execute(
            "INSERT INTO counts (type, day, count) VALUES (?1, ?2, 1)
             ON CONFLICT(type, day) DO UPDATE SET count = count + 1",
            params![table, day],
        )?;
        Ok(())
    }

    /// Total events of a category across all days
    pub fn total(&self, category: Category) -> StoreResult<u64> {
        let total: Option<i64> = self
            .conn
            .query_row(
                "SELECT SUM(count) FROM counts WHERE type = ?1",
                params![category.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(total.unwrap_or(0).max(0) as u64)
    }

    /// Executable paths seen so far
    pub fn programs(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM programs ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }
}

type SessionRow = (i64, String, f64, Option<f64>, String, Option<String>);

fn load_sessions(
    conn: &Connection,
    filter: &str,
    args: &[i64],
) -> StoreResult<Vec<RecordingSession>> {
    let sql = format!("SELECT {} FROM sessions{} ORDER BY id", SESSION_COLUMNS, filter);
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<SessionRow> = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
        })?
        .collect::<Result<_, _>>()?;
    rows.into_iter()
        .map(|(id, name, start, end, day1, day2)| {
            Ok(RecordingSession {
                id,
                name,
                start,
                end,
                day1: parse_day(&day1)?,
                day2: day2.as_deref().map(parse_day).transpose()?,
            })
        })
        .collect()
}

fn find_session(conn: &Connection, id: i64) -> StoreResult<RecordingSession> {
    load_sessions(conn, " WHERE id = ?1", &[id])?
        .pop()
        .ok_or(StoreError::UnknownSession(id))
}

/// `stamp` bounds of a session as SQL, open sessions have no upper bound
fn session_filter(session: &RecordingSession) -> (&'static str, Vec<f64>) {
    match session.end {
        Some(end) => (" WHERE stamp >= ?1 AND stamp < ?2", vec![session.start, end]),
        None => (" WHERE stamp >= ?1", vec![session.start]),
    }
}

/// Whether any category still holds an event of the session
fn session_has_events(conn: &Connection, session: &RecordingSession) -> StoreResult<bool> {
    let (filter, args) = session_filter(session);
    for category in Category::ALL {
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {}{} LIMIT 1", category.as_str(), filter),
                rusqlite::params_from_iter(args.iter()),
                |_| Ok(()),
            )
            .optional()?;
        if found.is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn parse_day(text: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(text, DAY_FORMAT)
        .map_err(|e| StoreError::InvalidRow(format!("bad day {:?}: {}", text, e)))
}

fn day_filter(range: Option<DayRange>) -> (String, Vec<String>) {
    match range {
        Some(range) => (
            " WHERE t.day BETWEEN ?1 AND ?2".to_string(),
            vec![
                range.start.format(DAY_FORMAT).to_string(),
                range.end.format(DAY_FORMAT).to_string(),
            ],
        ),
        None => (String::new(), Vec::new()),
    }
}

type MouseRow = (f64, String, Option<String>, i64, i64, i64, Option<u8>, Option<f64>, Option<f64>);
type KeyRow = (f64, String, Option<String>, String, String);

impl EventStore for SqliteStore {
    fn insert_batch(&mut self, records: &[Record]) -> Result<(), BatchError> {
        let failed = |source: StoreError| BatchError { written: 0, source };
        let tx = self.conn.transaction().map_err(|e| failed(e.into()))?;
        let mut known = self.program_ids.clone();
        for record in records {
            Self::insert_record(&tx, &mut known, record).map_err(failed)?;
        }
        // Nothing is committed unless the whole batch is
        tx.commit().map_err(|e| failed(e.into()))?;
        self.program_ids = known;
        Ok(())
    }

    fn records(&self, category: Category, range: Option<DayRange>) -> StoreResult<Vec<Record>> {
        let table = category.as_str();
        let (filter, args) = day_filter(range);
        let args = rusqlite::params_from_iter(args.iter());

        if category.is_mouse() {
            let (button, dx, dy) = match category {
                Category::Clicks => ("t.button", "NULL", "NULL"),
                Category::Scrolls => ("NULL", "t.dx", "t.dy"),
                _ => ("NULL", "NULL", "NULL"),
            };
            let sql = format!(
                "SELECT t.stamp, t.day, p.path, t.x, t.y, t.display, {}, {}, {} \
                 FROM {} t LEFT JOIN programs p ON p.id = t.fk_program{} ORDER BY t.id",
                button, dx, dy, table, filter
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows: Vec<MouseRow> = stmt
                .query_map(args, |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                })?
                .collect::<Result<_, _>>()?;
            rows.into_iter()
                .map(|(stamp, day, program, x, y, display, button, dx, dy)| {
                    Ok(Record {
                        category,
                        stamp,
                        day: parse_day(&day)?,
                        program,
                        fields: RecordFields::Mouse {
                            x: x as f64,
                            y: y as f64,
                            display: display.max(0) as usize,
                            button,
                            dx,
                            dy,
                        },
                    })
                })
                .collect()
        } else {
            let sql = format!(
                "SELECT t.stamp, t.day, p.path, t.key, t.realkey \
                 FROM {} t LEFT JOIN programs p ON p.id = t.fk_program{} ORDER BY t.id",
                table, filter
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows: Vec<KeyRow> = stmt
                .query_map(args, |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<Result<_, _>>()?;
            rows.into_iter()
                .map(|(stamp, day, program, key, realkey)| {
                    Ok(Record {
                        category,
                        stamp,
                        day: parse_day(&day)?,
                        program,
                        fields: RecordFields::Key { key, realkey },
                    })
                })
                .collect()
        }
    }

    fn day_counts(&self, category: Category) -> StoreResult<BTreeMap<NaiveDate, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT day, count FROM counts WHERE type = ?1 ORDER BY day")?;
        let rows: Vec<(String, i64)> = stmt
            .query_map(params![category.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        rows.into_iter()
            .map(|(day, count)| Ok((parse_day(&day)?, count.max(0) as u64)))
            .collect()
    }

    fn clear(&mut self, categories: &[Category], range: Option<DayRange>) -> StoreResult<u64> {
        let (filter, args) = day_filter(range);
        let filter = filter.replace("t.day", "day");
        let tx = self.conn.transaction()?;
        let mut deleted = 0u64;
        for category in categories {
            let table = category.as_str();
            deleted += tx.execute(
                &format!("DELETE FROM {}{}", table, filter),
                rusqlite::params_from_iter(args.iter()),
            )? as u64;

            let count_filter = if filter.is_empty() {
                " WHERE type = ?1".to_string()
            } else {
                " WHERE type = ?1 AND day BETWEEN ?2 AND ?3".to_string()
            };
            let count_args = std::iter::once(table.to_string()).chain(args.iter().cloned());
            tx.execute(
                &format!("DELETE FROM counts{}", count_filter),
                rusqlite::params_from_iter(count_args),
            )?;
        }

        let mut pruned = 0;
        if deleted > 0 {
            for session in load_sessions(&tx, "", &[])? {
                if session.is_open() || !session.within(range) {
                    continue;
                }
                if !session_has_events(&tx, &session)? {
                    tx.execute("DELETE FROM sessions WHERE id = ?1", params![session.id])?;
                    pruned += 1;
                }
            }
        }
        tx.commit()?;
        tracing::info!(
            "Deleted {} events from {:?}, {} emptied sessions",
            deleted,
            categories,
            pruned
        );
        Ok(deleted)
    }

    fn insert_screen_sizes(&mut self, snapshots: &[ScreenGeometry]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        for s in snapshots {
            tx.execute(
                "INSERT INTO screen_sizes (stamp, display, x, y, w, h) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![s.effective_from, s.display as i64, s.rect.x, s.rect.y, s.rect.w, s.rect.h],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn screen_sizes(&self) -> StoreResult<Vec<ScreenGeometry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT stamp, display, x, y, w, h FROM screen_sizes ORDER BY stamp, id")?;
        let rows = stmt
            .query_map([], |row| {
                let display: i64 = row.get(1)?;
                Ok(ScreenGeometry {
                    effective_from: row.get(0)?,
                    display: display.max(0) as usize,
                    rect: ScreenRect::new(row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_app_event(&mut self, event: AppEvent, stamp: f64) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO app_events (stamp, type) VALUES (?1, ?2)",
            params![stamp, event.as_str()],
        )?;
        Ok(())
    }

    fn vacuum(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("VACUUM")?;
        tracing::info!("Database vacuumed");
        Ok(())
    }

    fn start_session(&mut self, name: &str, stamp: f64) -> StoreResult<i64> {
        let day = stamp_to_day(stamp).format(DAY_FORMAT).to_string();
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"UPDATE sessions SET "end" = ?1, day2 = ?2 WHERE "end" IS NULL"#,
            params![stamp, day],
        )?;
        tx.execute(
            "INSERT INTO sessions (name, start, day1) VALUES (?1, ?2, ?3)",
            params![name, stamp, day],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        tracing::info!("Session {} \"{}\" started", id, name);
        Ok(id)
    }

    fn stop_session(&mut self, stamp: f64) -> StoreResult<Option<i64>> {
        let day = stamp_to_day(stamp).format(DAY_FORMAT).to_string();
        let tx = self.conn.transaction()?;
        let open: Option<i64> = tx
            .query_row(
                r#"SELECT id FROM sessions WHERE "end" IS NULL ORDER BY id DESC LIMIT 1"#,
                [],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute(
            r#"UPDATE sessions SET "end" = ?1, day2 = ?2 WHERE "end" IS NULL"#,
            params![stamp, day],
        )?;
        tx.commit()?;
        Ok(open)
    }

    fn rename_session(&mut self, id: i64, name: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("UPDATE sessions SET name = ?1 WHERE id = ?2", params![name, id])?;
        if changed == 0 {
            return Err(StoreError::UnknownSession(id));
        }
        Ok(())
    }

    fn delete_session(&mut self, id: i64) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::UnknownSession(id));
        }
        Ok(())
    }

    fn sessions(&self) -> StoreResult<Vec<RecordingSession>> {
        load_sessions(&self.conn, "", &[])
    }

    fn clear_session(&mut self, categories: &[Category], id: i64) -> StoreResult<u64> {
        let tx = self.conn.transaction()?;
        let session = find_session(&tx, id)?;
        let (filter, args) = session_filter(&session);

        let mut deleted = 0u64;
        for category in categories {
            let table = category.as_str();
            let per_day: Vec<(String, i64)> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT day, COUNT(*) FROM {}{} GROUP BY day",
                    table, filter
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<_, _>>()?;
                rows
            };
            deleted += tx.execute(
                &format!("DELETE FROM {}{}", table, filter),
                rusqlite::params_from_iter(args.iter()),
            )? as u64;
            for (day, count) in per_day {
                tx.execute(
                    "UPDATE counts SET count = MAX(count - ?1, 0) WHERE type = ?2 AND day = ?3",
                    params![count, table, day],
                )?;
            }
        }
        tx.commit()?;
        tracing::info!("Deleted {} events of session {} from {:?}", deleted, id, categories);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn make_click(x: f64, d: u32) -> Record {
        Record {
            category: Category::Clicks,
            stamp: 1_714_500_000.0 + f64::from(d),
            day: day(d),
            program: Some("/usr/bin/firefox".to_string()),
            fields: RecordFields::Mouse {
                x,
                y: 10.0,
                display: 1,
                button: Some(1),
                dx: None,
                dy: None,
            },
        }
    }

    fn make_combo(key: &str, d: u32) -> Record {
        Record {
            category: Category::Combos,
            stamp: 1_714_500_000.0 + f64::from(d),
            day: day(d),
            program: None,
            fields: RecordFields::Key {
                key: key.to_string(),
                realkey: key.replace("Ctrl", "Lcontrol"),
            },
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_batch(&[make_click(5.0, 1), make_combo("Ctrl-C", 1), make_click(6.0, 2)])
            .unwrap();

        assert_eq!(
            store.records(Category::Clicks, None).unwrap(),
            vec![make_click(5.0, 1), make_click(6.0, 2)]
        );
        assert_eq!(store.records(Category::Combos, None).unwrap(), vec![make_combo("Ctrl-C", 1)]);
        assert_eq!(store.total(Category::Clicks).unwrap(), 2);
        assert_eq!(store.total(Category::Moves).unwrap(), 0);
        let counts = store.day_counts(Category::Clicks).unwrap();
        assert_eq!(counts.get(&day(1)), Some(&1));
        assert_eq!(counts.get(&day(2)), Some(&1));
    }

    #[test]
    fn test_scroll_columns() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let scroll = Record {
            category: Category::Scrolls,
            stamp: 1.5,
            day: day(3),
            program: None,
            fields: RecordFields::Mouse {
                x: 100.0,
                y: 200.0,
                display: 0,
                button: None,
                dx: Some(0.0),
                dy: Some(-5.0),
            },
        };
        store.insert_batch(&[scroll.clone()]).unwrap();
        assert_eq!(store.records(Category::Scrolls, None).unwrap(), vec![scroll]);
    }

    #[test]
    fn test_clear_by_range_and_all() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_batch(&[make_click(1.0, 1), make_click(2.0, 2), make_click(3.0, 3)])
            .unwrap();
        store.insert_batch(&[make_combo("Ctrl-V", 2)]).unwrap();

        let deleted = store
            .clear(&[Category::Clicks], Some(DayRange::new(day(3), day(2))))
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.records(Category::Clicks, None).unwrap().len(), 1);
        assert_eq!(store.total(Category::Clicks).unwrap(), 1);

        let deleted = store.clear(&Category::ALL, None).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.total(Category::Combos).unwrap(), 0);
    }

    #[test]
    fn test_screen_sizes_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inputscope.db");
        let snapshots = vec![
            ScreenGeometry {
                display: 0,
                rect: ScreenRect::new(0, 0, 1920, 1080),
                effective_from: 10.0,
            },
            ScreenGeometry {
                display: 1,
                rect: ScreenRect::new(1920, 0, 1280, 1024),
                effective_from: 10.0,
            },
        ];
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.insert_screen_sizes(&snapshots).unwrap();
            store.insert_app_event(AppEvent::Start, 10.0).unwrap();
        }
        let mut store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.screen_sizes().unwrap(), snapshots);
        store.vacuum().unwrap();
    }

    #[test]
    fn test_programs_are_stored_once() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut other = make_click(9.0, 1);
        other.program = Some("/USR/BIN/FIREFOX".to_string());
        store.insert_batch(&[make_click(5.0, 1), make_combo("Ctrl-A", 1)]).unwrap();
        store.insert_batch(&[other]).unwrap();

        assert_eq!(store.programs().unwrap(), vec!["/usr/bin/firefox".to_string()]);
        let clicks = store.records(Category::Clicks, None).unwrap();
        assert_eq!(clicks[1].program.as_deref(), Some("/usr/bin/firefox"));
        assert_eq!(store.records(Category::Combos, None).unwrap()[0].program, None);
    }

    #[test]
    fn test_session_lifecycle() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = store.start_session("morning", 1_714_500_000.5).unwrap();
        let second = store.start_session("afternoon", 1_714_500_003.5).unwrap();
        assert_ne!(first, second);

        let sessions = store.sessions().unwrap();
        assert_eq!(sessions[0].end, Some(1_714_500_003.5));
        assert!(sessions[1].is_open());

        assert_eq!(store.stop_session(1_714_500_010.0).unwrap(), Some(second));
        assert_eq!(store.stop_session(1_714_500_011.0).unwrap(), None);

        store.rename_session(first, "early shift").unwrap();
        assert_eq!(store.sessions().unwrap()[0].name, "early shift");
        assert!(matches!(
            store.rename_session(99, "x"),
            Err(StoreError::UnknownSession(99))
        ));

        store.delete_session(first).unwrap();
        assert_eq!(store.sessions().unwrap().len(), 1);
        assert!(matches!(store.delete_session(first), Err(StoreError::UnknownSession(_))));
    }

    #[test]
    fn test_clear_session_lowers_day_counts() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        // Stamps are 1_714_500_000 + day
        store
            .insert_batch(&[make_click(1.0, 1), make_click(2.0, 2), make_click(3.0, 3)])
            .unwrap();
        store.insert_batch(&[make_combo("Ctrl-S", 2)]).unwrap();
        let id = store.start_session("edit", 1_714_500_001.5).unwrap();
        store.stop_session(1_714_500_002.5).unwrap();

        assert_eq!(store.clear_session(&[Category::Clicks], id).unwrap(), 1);
        assert_eq!(store.total(Category::Clicks).unwrap(), 2);
        assert_eq!(store.day_counts(Category::Clicks).unwrap().get(&day(2)), Some(&0));
        assert_eq!(store.records(Category::Combos, None).unwrap().len(), 1);
        assert!(matches!(
            store.clear_session(&[Category::Clicks], 7),
            Err(StoreError::UnknownSession(7))
        ));
    }

    #[test]
    fn test_clear_prunes_emptied_sessions() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_batch(&[make_click(1.0, 1), make_combo("Ctrl-Z", 3)])
            .unwrap();
        let clicks_only = store.start_session("clicks", 1_714_500_000.5).unwrap();
        store.start_session("combos", 1_714_500_002.5).unwrap();
        store.stop_session(1_714_500_003.5).unwrap();
        let running = store.start_session("running", 1_714_500_004.0).unwrap();

        store.clear(&[Category::Clicks], None).unwrap();
        let left: Vec<i64> = store.sessions().unwrap().iter().map(|s| s.id).collect();
        assert!(!left.contains(&clicks_only));
        assert_eq!(left.len(), 2);
        assert!(left.contains(&running));
    }

    #[test]
    fn test_open_bad_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("dir").join("x.db");
        assert!(matches!(SqliteStore::open(&path), Err(StoreError::Open { .. })));
    }
}
