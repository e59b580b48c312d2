//! Event reduction
//!
//! Turns normalized events into storage records. Moves along a straight
//! line and scrolls in one direction are folded into a pending record that
//! stays unsent until a later event breaks the run or it expires. Moves that
//! land on the same heatmap cell as the previous one are dropped.

use crate::capture::types::{Category, InputEvent, KeyEvent, MouseEvent};
use crate::config::ListenerConfig;
use crate::display::geometry::DisplayTracker;
use crate::processing::sessions::SessionStats;
use crate::storage::{Record, RecordFields};
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

/// Malformed input, skipped and counted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReduceError {
    #[error("Non-finite coordinates in {0} event")]
    NonFinite(Category),

    #[error("{0} event without {1}")]
    MissingField(Category, &'static str),

    #[error("{0} is not a {1} category")]
    CategoryMismatch(Category, &'static str),
}

/// Records not yet handed to storage, plus what coalescing compares against
#[derive(Debug, Clone, Default)]
pub struct ReducerState {
    /// Start of the current line of moves, already emitted
    pub prev_move: Option<Record>,
    /// Latest unsent move, extended while moves stay on one line
    pub pending_move: Option<Record>,
    /// Latest unsent scroll, summed while direction holds
    pub pending_scroll: Option<Record>,
    /// Heatmap cell of the previous move as (display, x, y)
    pub scaled_move: Option<(usize, u32, u32)>,
    /// Stamp of the previous event per category
    pub last_stamps: HashMap<Category, f64>,
}

#[derive(Debug, Default)]
pub struct EventReducer {
    state: ReducerState,
    counts: BTreeMap<Category, u64>,
    soft_errors: u64,
    key_stamps: VecDeque<f64>,
}

impl EventReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReducerState {
        &self.state
    }

    /// Records created per category since start
    pub fn counts(&self) -> &BTreeMap<Category, u64> {
        &self.counts
    }

    pub fn soft_errors(&self) -> u64 {
        self.soft_errors
    }

    /// Reduce one event. Returns records that are final; a malformed event
    /// yields nothing and bumps the soft error count.
    pub fn reduce(
        &mut self,
        event: InputEvent,
        tracker: &mut DisplayTracker,
        config: &ListenerConfig,
    ) -> Vec<Record> {
        let mut out = Vec::new();
        let result = match event {
            InputEvent::Key(key) => self.reduce_key(key, config, &mut out),
            InputEvent::Mouse(mouse) => self.reduce_mouse(mouse, tracker, config, &mut out),
        };
        if let Err(e) = result {
            self.soft_errors += 1;
            tracing::warn!("Skipping malformed event: {}", e);
        }
        out
    }

    /// Emit pending records older than their join interval
    pub fn flush_expired(&mut self, now: f64, config: &ListenerConfig) -> Vec<Record> {
        let mut out = Vec::new();
        if self
            .state
            .pending_move
            .as_ref()
            .is_some_and(|m| now - m.stamp >= config.mouse_move_join_interval)
        {
            let pending = self.state.pending_move.take();
            out.extend(pending.clone());
            self.state.prev_move = pending;
        }
        if self
            .state
            .pending_scroll
            .as_ref()
            .is_some_and(|s| now - s.stamp >= config.mouse_scroll_join_interval)
        {
            out.extend(self.state.pending_scroll.take());
        }
        out
    }

    /// Emit everything pending, e.g. on stop
    pub fn flush_all(&mut self) -> Vec<Record> {
        let mut out: Vec<Record> = self.state.pending_move.take().into_iter().collect();
        out.extend(self.state.pending_scroll.take());
        self.state.prev_move = None;
        out
    }

    /// Typing session figures over keypresses within `window` (inclusive)
    pub fn session_stats(&self, window: Option<(f64, f64)>, max_delta: f64) -> SessionStats {
        let stamps: Vec<f64> = self
            .key_stamps
            .iter()
            .copied()
            .filter(|s| window.map_or(true, |(start, end)| start <= *s && *s <= end))
            .collect();
        SessionStats::compute(&stamps, max_delta)
    }

    fn count(&mut self, category: Category) {
        *self.counts.entry(category).or_default() += 1;
    }

    fn reduce_key(
        &mut self,
        key: KeyEvent,
        config: &ListenerConfig,
        out: &mut Vec<Record>,
    ) -> Result<(), ReduceError> {
        if key.category.is_mouse() {
            return Err(ReduceError::CategoryMismatch(key.category, "keyboard"));
        }
        self.state.last_stamps.insert(key.category, key.stamp);
        if key.category == Category::Keys {
            self.key_stamps.push_back(key.stamp);
            while self.key_stamps.len() > config.key_history_limit {
                self.key_stamps.pop_front();
            }
        }

        self.count(key.category);
        out.push(Record {
            category: key.category,
            stamp: key.stamp,
            day: key.day,
            program: key.program,
            fields: RecordFields::Key {
                key: key.key,
                realkey: key.realkey,
            },
        });
        Ok(())
    }

    fn reduce_mouse(
        &mut self,
        mouse: MouseEvent,
        tracker: &mut DisplayTracker,
        config: &ListenerConfig,
        out: &mut Vec<Record>,
    ) -> Result<(), ReduceError> {
        let category = mouse.category;
        if !category.is_mouse() {
            return Err(ReduceError::CategoryMismatch(category, "mouse"));
        }
        if !mouse.x.is_finite() || !mouse.y.is_finite() {
            return Err(ReduceError::NonFinite(category));
        }
        match category {
            Category::Clicks if mouse.button.is_none() => {
                return Err(ReduceError::MissingField(category, "button"));
            }
            Category::Scrolls => match (mouse.dx, mouse.dy) {
                (Some(dx), Some(dy)) if dx.is_finite() && dy.is_finite() => {}
                (Some(_), Some(_)) => return Err(ReduceError::NonFinite(category)),
                _ => return Err(ReduceError::MissingField(category, "dx/dy")),
            },
            _ => {}
        }

        let prev_stamp = self.state.last_stamps.insert(category, mouse.stamp);
        let record = mouse_record(&mouse);
        match category {
            Category::Moves => self.reduce_move(record, prev_stamp, tracker, config, out),
            Category::Scrolls => self.reduce_scroll(record, prev_stamp, config, out),
            _ => {
                self.count(category);
                out.push(record);
            }
        }
        Ok(())
    }

    fn reduce_move(
        &mut self,
        record: Record,
        prev_stamp: Option<f64>,
        tracker: &mut DisplayTracker,
        config: &ListenerConfig,
        out: &mut Vec<Record>,
    ) {
        let interval = config.mouse_move_join_interval;
        if interval <= 0.0 {
            self.count(Category::Moves);
            out.push(record);
            return;
        }

        let Some((x, y, display)) = mouse_point(&record) else {
            return;
        };
        let (cx, cy) = tracker.rescale(x, y, display, record.stamp, config.mouse_heatmap_size);
        let scaled = (display, cx, cy);
        if self.state.scaled_move == Some(scaled)
            && prev_stamp.is_some_and(|p| record.stamp - p < interval)
        {
            tracing::trace!("Dropping move on same heatmap cell {:?}", scaled);
            return;
        }
        self.state.scaled_move = Some(scaled);

        if self.is_linear(&record, tracker, config) {
            if let Some(pending) = self.state.pending_move.as_mut() {
                if let RecordFields::Mouse { x: px, y: py, .. } = &mut pending.fields {
                    *px = x;
                    *py = y;
                }
                pending.stamp = record.stamp;
                pending.day = record.day;
            }
            return;
        }

        let previous = self.state.pending_move.take();
        out.extend(previous.clone());
        self.state.prev_move = previous;
        self.count(Category::Moves);
        self.state.pending_move = Some(record);
    }

    /// Whether the new move continues the line from the emitted move through
    /// the pending one, in time and in heatmap space
    fn is_linear(&self, record: &Record, tracker: &mut DisplayTracker, config: &ListenerConfig) -> bool {
        let (Some(move0), Some(move1)) = (&self.state.prev_move, &self.state.pending_move) else {
            return false;
        };
        let (Some(p0), Some(p1), Some(p2)) = (
            mouse_point(move0),
            mouse_point(move1),
            mouse_point(record),
        ) else {
            return false;
        };
        let interval = config.mouse_move_join_interval;
        if p0.2 != p1.2 || p1.2 != p2.2 {
            return false;
        }
        if move1.stamp - move0.stamp >= interval || record.stamp - move1.stamp >= interval {
            return false;
        }

        let grid = config.mouse_heatmap_size;
        let cells = [
            tracker.rescale(p0.0, p0.1, p0.2, move0.stamp, grid),
            tracker.rescale(p1.0, p1.1, p1.2, move1.stamp, grid),
            tracker.rescale(p2.0, p2.1, p2.2, record.stamp, grid),
        ];
        one_line(cells, config.mouse_move_join_radius)
    }

    fn reduce_scroll(
        &mut self,
        record: Record,
        prev_stamp: Option<f64>,
        config: &ListenerConfig,
        out: &mut Vec<Record>,
    ) {
        let interval = config.mouse_scroll_join_interval;
        if interval <= 0.0 {
            self.count(Category::Scrolls);
            out.push(record);
            return;
        }

        let within = prev_stamp.is_some_and(|p| record.stamp - p < interval);
        if let (true, Some(pending)) = (within, self.state.pending_scroll.as_mut()) {
            if let (
                RecordFields::Mouse {
                    x,
                    y,
                    display,
                    dx: Some(dx),
                    dy: Some(dy),
                    ..
                },
                RecordFields::Mouse {
                    x: nx,
                    y: ny,
                    display: nd,
                    dx: Some(ndx),
                    dy: Some(ndy),
                    ..
                },
            ) = (&mut pending.fields, &record.fields)
            {
                if *display == *nd && sign(*dx) == sign(*ndx) && sign(*dy) == sign(*ndy) {
                    *dx += ndx;
                    *dy += ndy;
                    *x = *nx;
                    *y = *ny;
                    pending.stamp = record.stamp;
                    pending.day = record.day;
                    return;
                }
            }
        }

        out.extend(self.state.pending_scroll.take());
        self.count(Category::Scrolls);
        self.state.pending_scroll = Some(record);
    }
}

fn mouse_record(mouse: &MouseEvent) -> Record {
    Record {
        category: mouse.category,
        stamp: mouse.stamp,
        day: mouse.day,
        program: mouse.program.clone(),
        fields: RecordFields::Mouse {
            x: mouse.x,
            y: mouse.y,
            display: mouse.display,
            button: mouse.button,
            dx: mouse.dx,
            dy: mouse.dy,
        },
    }
}

fn mouse_point(record: &Record) -> Option<(f64, f64, usize)> {
    match record.fields {
        RecordFields::Mouse { x, y, display, .. } => Some((x, y, display)),
        RecordFields::Key { .. } => None,
    }
}

fn sign(v: f64) -> i8 {
    if v < 0.0 {
        -1
    } else if v > 0.0 {
        1
    } else {
        0
    }
}

/// Whether three heatmap cells more or less fall onto one line
fn one_line(cells: [(u32, u32); 3], radius: f64) -> bool {
    let [(x1, y1), (x2, y2), (x3, y3)] = cells.map(|(x, y)| (i64::from(x), i64::from(y)));
    let monotonic = |a: i64, b: i64, c: i64| (a >= b && b >= c) || (a <= b && b <= c);
    if !monotonic(x1, x2, x3) && !monotonic(y1, y2, y3) {
        return false;
    }
    ((y1 - y2) * (x1 - x3) - (y1 - y3) * (x1 - x2)).abs() as f64 <= radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::stamp_to_day;
    use crate::display::geometry::ScreenRect;

    const T0: f64 = 1_700_000_000.0;

    /// Default 1920x1080 layout onto 640x360 cells: one cell is 3x3 pixels
    fn setup() -> (EventReducer, DisplayTracker, ListenerConfig) {
        let config = ListenerConfig::default();
        let tracker = DisplayTracker::new(config.default_screen_size);
        (EventReducer::new(), tracker, config)
    }

    fn make_mouse(category: Category, x: f64, y: f64, t: f64) -> MouseEvent {
        MouseEvent {
            category,
            x,
            y,
            display: 0,
            button: None,
            dx: None,
            dy: None,
            stamp: T0 + t,
            day: stamp_to_day(T0 + t),
            program: None,
        }
    }

    /// Move landing on heatmap cell (cx, cy)
    fn make_move(cx: f64, cy: f64, t: f64) -> InputEvent {
        InputEvent::Mouse(make_mouse(Category::Moves, cx * 3.0, cy * 3.0, t))
    }

    fn make_scroll(dx: f64, dy: f64, t: f64) -> InputEvent {
        let mut scroll = make_mouse(Category::Scrolls, 500.0, 500.0, t);
        scroll.dx = Some(dx);
        scroll.dy = Some(dy);
        InputEvent::Mouse(scroll)
    }

    fn make_key(key: &str, t: f64) -> InputEvent {
        InputEvent::Key(KeyEvent {
            category: Category::Keys,
            key: key.to_string(),
            realkey: key.to_string(),
            stamp: T0 + t,
            day: stamp_to_day(T0 + t),
            program: None,
        })
    }

    fn run(
        reducer: &mut EventReducer,
        tracker: &mut DisplayTracker,
        config: &ListenerConfig,
        events: Vec<InputEvent>,
    ) -> Vec<Record> {
        let mut out = Vec::new();
        for event in events {
            out.extend(reducer.reduce(event, tracker, config));
        }
        out.extend(reducer.flush_all());
        out
    }

    fn xy(record: &Record) -> (f64, f64) {
        let (x, y, _) = mouse_point(record).unwrap();
        (x, y)
    }

    fn scroll_delta(record: &Record) -> (f64, f64) {
        match record.fields {
            RecordFields::Mouse {
                dx: Some(dx),
                dy: Some(dy),
                ..
            } => (dx, dy),
            _ => panic!("not a scroll"),
        }
    }

    #[test]
    fn test_linear_moves_coalesce_to_start_and_end_points() {
        let (mut reducer, mut tracker, config) = setup();
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![
                make_move(10.0, 10.0, 0.0),
                make_move(20.0, 20.0, 0.1),
                make_move(30.0, 30.0, 0.2),
            ],
        );
        assert_eq!(
            out.len(),
            2,
            "one line is stored as its emitted start point plus the pending end point"
        );
        assert_eq!(xy(&out[0]), (30.0, 30.0));
        assert_eq!(xy(&out[1]), (90.0, 90.0));
        assert_eq!(out[1].stamp, T0 + 0.2);
        assert_eq!(reducer.counts().get(&Category::Moves), Some(&2));
    }

    #[test]
    fn test_turn_breaks_line() {
        let (mut reducer, mut tracker, config) = setup();
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![
                make_move(10.0, 10.0, 0.0),
                make_move(20.0, 20.0, 0.1),
                make_move(30.0, 30.0, 0.2),
                make_move(30.0, 5.0, 0.3),
            ],
        );
        let points: Vec<_> = out.iter().map(xy).collect();
        assert_eq!(points, vec![(30.0, 30.0), (90.0, 90.0), (90.0, 15.0)]);
    }

    #[test]
    fn test_slow_moves_do_not_coalesce() {
        let (mut reducer, mut tracker, config) = setup();
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![
                make_move(10.0, 10.0, 0.0),
                make_move(20.0, 20.0, 0.6),
                make_move(30.0, 30.0, 1.2),
            ],
        );
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_same_cell_dropped() {
        let (mut reducer, mut tracker, config) = setup();
        let first = InputEvent::Mouse(make_mouse(Category::Moves, 30.0, 30.0, 0.0));
        let same_cell = InputEvent::Mouse(make_mouse(Category::Moves, 31.0, 32.0, 0.1));
        let out = run(&mut reducer, &mut tracker, &config, vec![first, same_cell]);
        assert_eq!(out.len(), 1);
        assert_eq!(xy(&out[0]), (30.0, 30.0));
        assert_eq!(reducer.counts().get(&Category::Moves), Some(&1));
    }

    #[test]
    fn test_same_cell_after_interval_kept() {
        let (mut reducer, mut tracker, config) = setup();
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![make_move(10.0, 10.0, 0.0), make_move(10.0, 10.0, 2.0)],
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_moves_on_different_displays_do_not_coalesce() {
        let (mut reducer, mut tracker, config) = setup();
        tracker.update(
            &[
                ScreenRect::new(0, 0, 1920, 1080),
                ScreenRect::new(1920, 0, 1920, 1080),
            ],
            T0 - 10.0,
        );
        // Would continue the line if it were on display 0
        let mut third = make_mouse(Category::Moves, 1920.0 + 90.0, 90.0, 0.2);
        third.display = 1;
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![
                make_move(10.0, 10.0, 0.0),
                make_move(20.0, 20.0, 0.1),
                InputEvent::Mouse(third),
            ],
        );
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_scrolls_merge_same_direction() {
        let (mut reducer, mut tracker, config) = setup();
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![make_scroll(0.0, -3.0, 0.0), make_scroll(0.0, -2.0, 0.2)],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(scroll_delta(&out[0]), (0.0, -5.0));
        assert_eq!(out[0].stamp, T0 + 0.2);
    }

    #[test]
    fn test_scroll_direction_change_splits() {
        let (mut reducer, mut tracker, config) = setup();
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![make_scroll(0.0, -3.0, 0.0), make_scroll(0.0, 1.0, 0.1)],
        );
        let deltas: Vec<_> = out.iter().map(scroll_delta).collect();
        assert_eq!(deltas, vec![(0.0, -3.0), (0.0, 1.0)]);
        assert_eq!(reducer.counts().get(&Category::Scrolls), Some(&2));
    }

    #[test]
    fn test_scrolls_on_other_display_stay_separate() {
        let (mut reducer, mut tracker, config) = setup();
        tracker.update(
            &[
                ScreenRect::new(0, 0, 1920, 1080),
                ScreenRect::new(1920, 0, 1920, 1080),
            ],
            T0 - 10.0,
        );
        let mut second = make_mouse(Category::Scrolls, 1920.0 + 500.0, 500.0, 0.1);
        second.display = 1;
        second.dx = Some(0.0);
        second.dy = Some(-2.0);
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![make_scroll(0.0, -3.0, 0.0), InputEvent::Mouse(second)],
        );
        let deltas: Vec<_> = out.iter().map(scroll_delta).collect();
        assert_eq!(deltas, vec![(0.0, -3.0), (0.0, -2.0)]);
    }

    #[test]
    fn test_scrolls_past_join_interval_stay_separate() {
        let (mut reducer, mut tracker, config) = setup();
        let late = config.mouse_scroll_join_interval + 0.1;
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![make_scroll(0.0, -3.0, 0.0), make_scroll(0.0, -2.0, late)],
        );
        let deltas: Vec<_> = out.iter().map(scroll_delta).collect();
        assert_eq!(deltas, vec![(0.0, -3.0), (0.0, -2.0)]);
        assert_eq!(reducer.counts().get(&Category::Scrolls), Some(&2));
    }

    #[test]
    fn test_flush_expired_keeps_fresh_pending() {
        let (mut reducer, mut tracker, config) = setup();
        assert!(reducer
            .reduce(make_scroll(0.0, 1.0, 0.0), &mut tracker, &config)
            .is_empty());
        assert!(reducer.flush_expired(T0 + 0.1, &config).is_empty());
        assert_eq!(reducer.flush_expired(T0 + 0.6, &config).len(), 1);
        assert!(reducer.state().pending_scroll.is_none());
    }

    #[test]
    fn test_malformed_events_are_soft_errors() {
        let (mut reducer, mut tracker, config) = setup();
        let click_without_button = make_mouse(Category::Clicks, 1.0, 1.0, 0.0);
        let nan_move = make_mouse(Category::Moves, f64::NAN, 1.0, 0.1);
        let mut scroll_without_delta = make_mouse(Category::Scrolls, 1.0, 1.0, 0.2);
        scroll_without_delta.dx = Some(1.0);
        let mouse_as_keys = make_mouse(Category::Keys, 1.0, 1.0, 0.3);
        let mut click = make_mouse(Category::Clicks, 5.0, 5.0, 0.4);
        click.button = Some(1);

        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![
                InputEvent::Mouse(click_without_button),
                InputEvent::Mouse(nan_move),
                InputEvent::Mouse(scroll_without_delta),
                InputEvent::Mouse(mouse_as_keys),
                InputEvent::Mouse(click),
            ],
        );
        assert_eq!(reducer.soft_errors(), 4);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, Category::Clicks);
    }

    #[test]
    fn test_keys_emit_immediately_and_feed_sessions() {
        let (mut reducer, mut tracker, config) = setup();
        let mut out = Vec::new();
        for (i, t) in [0.0, 1.0, 2.0, 7.0, 8.0].iter().enumerate() {
            out.extend(reducer.reduce(make_key(&format!("K{}", i), *t), &mut tracker, &config));
        }
        assert_eq!(out.len(), 5);
        assert_eq!(reducer.counts().get(&Category::Keys), Some(&5));

        let stats = reducer.session_stats(None, config.keyboard_session_max_delta);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.longest_session_keys, 3);

        let windowed = reducer.session_stats(Some((T0 + 6.0, T0 + 9.0)), 3.0);
        assert_eq!(windowed.sessions, 1);
        assert_eq!(windowed.keys, 2);
    }

    #[test]
    fn test_key_history_is_bounded() {
        let (mut reducer, mut tracker, mut config) = setup();
        config.key_history_limit = 3;
        for t in 0..10 {
            reducer.reduce(make_key("A", f64::from(t)), &mut tracker, &config);
        }
        assert_eq!(reducer.session_stats(None, 3.0).keys, 3);
    }

    #[test]
    fn test_zero_interval_disables_joining() {
        let (mut reducer, mut tracker, mut config) = setup();
        config.mouse_move_join_interval = 0.0;
        config.mouse_scroll_join_interval = 0.0;
        let out = run(
            &mut reducer,
            &mut tracker,
            &config,
            vec![
                make_move(10.0, 10.0, 0.0),
                make_move(10.0, 10.0, 0.1),
                make_scroll(0.0, -1.0, 0.2),
                make_scroll(0.0, -1.0, 0.3),
            ],
        );
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_one_line() {
        assert!(one_line([(10, 10), (20, 20), (30, 30)], 5.0));
        assert!(!one_line([(10, 10), (30, 30), (30, 5)], 5.0));
        // Doubling back fails the monotonic check on both axes
        assert!(!one_line([(10, 10), (20, 20), (10, 10)], 5.0));
    }
}
