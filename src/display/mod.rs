//! Display layout tracking for mouse events

pub mod geometry;
pub mod regions;

pub use geometry::{DisplayTracker, ScreenGeometry, ScreenRect};
pub use regions::{RegionEntry, RegionFilter};
