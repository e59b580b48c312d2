//! Display geometry history
//!
//! Every display keeps a time-ordered list of the rectangles it has had. Mouse
//! events are attributed to a display by position and rescaled against the
//! geometry active at their timestamp.

use serde::{Deserialize, Serialize};

/// Display rectangle in desktop pixels, serialized as `[x, y, w, h]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct ScreenRect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl ScreenRect {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle at the origin with the given size
    pub fn sized(size: (u32, u32)) -> Self {
        Self::new(0, 0, i64::from(size.0), i64::from(size.1))
    }

    fn in_x(&self, x: f64) -> bool {
        self.x as f64 <= x && x <= (self.x + self.w) as f64
    }

    fn in_y(&self, y: f64) -> bool {
        self.y as f64 <= y && y <= (self.y + self.h) as f64
    }

    /// Inclusive on all edges
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.in_x(x) && self.in_y(y)
    }
}

impl From<[i64; 4]> for ScreenRect {
    fn from(v: [i64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<ScreenRect> for [i64; 4] {
    fn from(r: ScreenRect) -> Self {
        [r.x, r.y, r.w, r.h]
    }
}

/// One display's rectangle from `effective_from` until the next snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub display: usize,
    pub rect: ScreenRect,
    /// UNIX time in seconds
    pub effective_from: f64,
}

#[derive(Debug, Clone)]
pub struct DisplayTracker {
    default_rect: ScreenRect,
    /// Current layout, indexed by display
    layout: Vec<ScreenRect>,
    /// Snapshots per display, ascending by `effective_from`
    history: Vec<Vec<ScreenGeometry>>,
    /// Last resolved history index per display
    cursors: Vec<usize>,
}

impl DisplayTracker {
    pub fn new(default_size: (u32, u32)) -> Self {
        let default_rect = ScreenRect::sized(default_size);
        Self {
            default_rect,
            layout: vec![default_rect],
            history: Vec::new(),
            cursors: Vec::new(),
        }
    }

    pub fn layout(&self) -> &[ScreenRect] {
        &self.layout
    }

    /// Change the fallback size. Takes over the layout only while no display
    /// has been reported.
    pub fn set_default_size(&mut self, size: (u32, u32)) {
        self.default_rect = ScreenRect::sized(size);
        if self.history.iter().all(Vec::is_empty) {
            self.layout = vec![self.default_rect];
        }
    }

    pub fn history(&self, display: usize) -> &[ScreenGeometry] {
        self.history.get(display).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Load previously stored snapshots, e.g. from storage at startup.
    ///
    /// The latest rectangle of every display becomes the current layout.
    pub fn seed(&mut self, snapshots: impl IntoIterator<Item = ScreenGeometry>) {
        let mut snapshots: Vec<_> = snapshots.into_iter().collect();
        snapshots.sort_by(|a, b| a.effective_from.total_cmp(&b.effective_from));
        for snapshot in snapshots {
            self.append(snapshot);
        }
        let latest: Vec<ScreenRect> = self
            .history
            .iter()
            .map_while(|entries| entries.last().map(|g| g.rect))
            .collect();
        if !latest.is_empty() {
            self.layout = latest;
        }
    }

    /// Apply a reported display layout.
    ///
    /// Returns the snapshots that were appended: only displays whose rectangle
    /// differs from their last recorded one get a new entry.
    pub fn update(&mut self, sizes: &[ScreenRect], now: f64) -> Vec<ScreenGeometry> {
        if sizes.is_empty() {
            tracing::warn!("Ignoring empty display layout");
            return Vec::new();
        }

        let mut appended = Vec::new();
        for (display, rect) in sizes.iter().enumerate() {
            let changed = self
                .history(display)
                .last()
                .map_or(true, |last| last.rect != *rect);
            if changed {
                let snapshot = ScreenGeometry {
                    display,
                    rect: *rect,
                    effective_from: now,
                };
                self.append(snapshot);
                appended.push(snapshot);
            }
        }
        self.layout = sizes.to_vec();

        if !appended.is_empty() {
            tracing::info!("Display layout changed: {:?}", self.layout);
        }
        appended
    }

    fn append(&mut self, snapshot: ScreenGeometry) {
        if self.history.len() <= snapshot.display {
            self.history.resize_with(snapshot.display + 1, Vec::new);
            self.cursors.resize(snapshot.display + 1, 0);
        }
        let entries = &mut self.history[snapshot.display];
        match entries.last().map(|last| last.effective_from) {
            Some(from) if from > snapshot.effective_from => {
                tracing::warn!(
                    "Dropping out-of-order geometry for display {} at {}",
                    snapshot.display,
                    snapshot.effective_from
                );
            }
            Some(from) if from == snapshot.effective_from => {
                // Same instant supersedes
                if let Some(last) = entries.last_mut() {
                    *last = snapshot;
                }
            }
            _ => entries.push(snapshot),
        }
    }

    /// Display under a point in the current layout.
    ///
    /// Points past the last display go to the last display, points sharing
    /// one axis with a display go to that display, anything else to display 0.
    pub fn resolve_display(&self, x: f64, y: f64) -> (usize, ScreenRect) {
        if let Some(found) = self.layout.iter().position(|r| r.contains(x, y)) {
            return (found, self.layout[found]);
        }

        let last_index = self.layout.len().saturating_sub(1);
        let last = self.layout.get(last_index).copied().unwrap_or(self.default_rect);
        if x >= (last.x + last.w) as f64 || y >= (last.y + last.h) as f64 {
            return (last_index, last);
        }

        if let Some(found) = self.layout.iter().position(|r| r.in_x(x) || r.in_y(y)) {
            return (found, self.layout[found]);
        }
        (0, self.layout.first().copied().unwrap_or(self.default_rect))
    }

    /// Rectangle display `display` had at time `t`.
    ///
    /// Before the first snapshot the first one applies; a display without any
    /// history uses the current layout or the default screen size.
    pub fn geometry_at(&mut self, display: usize, t: f64) -> ScreenRect {
        let entries = match self.history.get(display) {
            Some(entries) if !entries.is_empty() => entries,
            _ => {
                return self.layout.get(display).copied().unwrap_or(self.default_rect);
            }
        };

        let mut index = self.cursors[display].min(entries.len() - 1);
        if entries[index].effective_from <= t {
            while index + 1 < entries.len() && entries[index + 1].effective_from <= t {
                index += 1;
            }
        } else {
            while index > 0 && entries[index].effective_from > t {
                index -= 1;
            }
        }
        self.cursors[display] = index;
        entries[index].rect
    }

    /// Map a desktop point into a `grid`-sized heatmap cell of its display,
    /// clamped to the grid.
    pub fn rescale(&mut self, x: f64, y: f64, display: usize, t: f64, grid: (u32, u32)) -> (u32, u32) {
        let rect = self.geometry_at(display, t);
        (
            scale_axis(x - rect.x as f64, rect.w, grid.0),
            scale_axis(y - rect.y as f64, rect.h, grid.1),
        )
    }
}

fn scale_axis(offset: f64, extent: i64, cells: u32) -> u32 {
    if cells == 0 {
        return 0;
    }
    let max = f64::from(cells - 1);
    if extent <= 0 || !offset.is_finite() {
        return 0;
    }
    (offset * f64::from(cells) / extent as f64).floor().clamp(0.0, max) as u32
}
