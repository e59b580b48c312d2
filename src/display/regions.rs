//! Mouse regions of interest and disinterest

use crate::display::geometry::ScreenRect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configured area as `[x, y, w, h]`, optionally bound to one display.
///
/// Values within 0..1 are ratios of the display size, anything else is
/// desktop pixels. Serialized as `[x, y, w, h]` or `[display, [x, y, w, h]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionEntry {
    Display(usize, [f64; 4]),
    All([f64; 4]),
}

impl RegionEntry {
    fn display(&self) -> Option<usize> {
        match self {
            RegionEntry::Display(display, _) => Some(*display),
            RegionEntry::All(_) => None,
        }
    }

    fn area(&self) -> [f64; 4] {
        match self {
            RegionEntry::Display(_, area) | RegionEntry::All(area) => *area,
        }
    }

    /// Area in desktop pixels on the given display
    fn resolve(&self, rect: &ScreenRect) -> Area {
        let [x, y, w, h] = self.area();
        Area {
            x: ratio_or_pixels(x, rect.w, rect.x, false),
            y: ratio_or_pixels(y, rect.h, rect.y, false),
            w: ratio_or_pixels(w, rect.w, 0, true),
            h: ratio_or_pixels(h, rect.h, 0, true),
        }
    }
}

fn is_ratio(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

/// Ratio positions are relative to the display origin, offsets round down
/// and extents round up.
fn ratio_or_pixels(v: f64, extent: i64, origin: i64, ceil: bool) -> f64 {
    if !is_ratio(v) {
        return v;
    }
    let scaled = v * extent as f64;
    let scaled = if ceil { scaled.ceil() } else { scaled.floor() };
    scaled + origin as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Area {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Area {
    fn contains(&self, x: f64, y: f64) -> bool {
        self.x <= x && x <= self.x + self.w && self.y <= y && y <= self.y + self.h
    }
}

/// Resolved regions per display, rebuilt on every layout change
#[derive(Debug, Clone, Default)]
pub struct RegionFilter {
    interest: HashMap<usize, Vec<Area>>,
    disinterest: HashMap<usize, Vec<Area>>,
}

impl RegionFilter {
    pub fn new(layout: &[ScreenRect], interest: &[RegionEntry], disinterest: &[RegionEntry]) -> Self {
        Self {
            interest: resolve_all(layout, interest),
            disinterest: resolve_all(layout, disinterest),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.interest.is_empty() && self.disinterest.is_empty()
    }

    /// Whether a mouse event at (x, y) on `display` is to be skipped
    pub fn is_ignored(&self, x: f64, y: f64, display: usize) -> bool {
        let outside_interest = self
            .interest
            .get(&display)
            .is_some_and(|areas| !areas.iter().any(|a| a.contains(x, y)));
        let inside_disinterest = self
            .disinterest
            .get(&display)
            .is_some_and(|areas| areas.iter().any(|a| a.contains(x, y)));
        outside_interest || inside_disinterest
    }
}

fn resolve_all(layout: &[ScreenRect], entries: &[RegionEntry]) -> HashMap<usize, Vec<Area>> {
    let mut out: HashMap<usize, Vec<Area>> = HashMap::new();
    for entry in entries {
        let displays: Vec<usize> = match entry.display() {
            Some(display) if display < layout.len() => vec![display],
            Some(index) => {
                tracing::debug!("Region for unknown display {} skipped", index);
                Vec::new()
            }
            None => (0..layout.len()).collect(),
        };
        for display in displays {
            out.entry(display)
                .or_default()
                .push(entry.resolve(&layout[display]));
        }
    }
    out
}
