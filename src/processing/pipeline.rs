//! Single-consumer processing chain
//!
//! Owns every piece of mutable capture state: modifier state, display
//! history, regions, program lookups and pending records. Only the consumer
//! thread touches it.

use crate::capture::flags::CaptureFlags;
use crate::capture::programs::ExeLookup;
use crate::capture::types::{Category, InputEvent, KeyEvent, MouseEvent, RawInput, RawInputEvent};
use crate::config::ListenerConfig;
use crate::display::geometry::{DisplayTracker, ScreenGeometry, ScreenRect};
use crate::display::regions::RegionFilter;
use crate::keyboard::normalizer::{KeyNormalizer, Platform};
use crate::processing::programs::Programs;
use crate::processing::reducer::EventReducer;
use crate::storage::Record;
use chrono::NaiveDate;

pub struct Pipeline {
    normalizer: KeyNormalizer,
    tracker: DisplayTracker,
    regions: RegionFilter,
    programs: Programs,
    reducer: EventReducer,
}

/// Mouse fields shared by all mouse categories
struct MouseInput {
    category: Category,
    x: f64,
    y: f64,
    button: Option<u8>,
    dx: Option<f64>,
    dy: Option<f64>,
}

impl Pipeline {
    pub fn new(platform: Platform, config: &ListenerConfig) -> Self {
        let tracker = DisplayTracker::new(config.default_screen_size);
        let regions = RegionFilter::new(
            tracker.layout(),
            &config.mouse_regions_of_interest,
            &config.mouse_regions_of_disinterest,
        );
        Self {
            normalizer: KeyNormalizer::new(platform),
            tracker,
            regions,
            programs: Programs::new(config),
            reducer: EventReducer::new(),
        }
    }

    /// Attribute events to programs through `lookup`
    pub fn set_exe_lookup(&mut self, lookup: Box<dyn ExeLookup>) {
        self.programs.set_lookup(lookup);
    }

    pub fn tracker(&self) -> &DisplayTracker {
        &self.tracker
    }

    pub fn reducer(&self) -> &EventReducer {
        &self.reducer
    }

    pub fn normalizer_mut(&mut self) -> &mut KeyNormalizer {
        &mut self.normalizer
    }

    /// Restore display history loaded from storage
    pub fn seed_geometry(&mut self, history: Vec<ScreenGeometry>, config: &ListenerConfig) {
        if history.is_empty() {
            return;
        }
        tracing::debug!("Restoring {} display snapshots", history.len());
        self.tracker.seed(history);
        self.rebuild_regions(config);
    }

    /// Apply a new display layout. Displays are ordered by position.
    ///
    /// Returns the snapshots to persist.
    pub fn set_screen_sizes(
        &mut self,
        sizes: &[ScreenRect],
        now: f64,
        config: &ListenerConfig,
    ) -> Vec<ScreenGeometry> {
        let mut sizes = sizes.to_vec();
        sizes.sort();
        let appended = self.tracker.update(&sizes, now);
        self.rebuild_regions(config);
        appended
    }

    /// Pick up changed settings after `configure`
    pub fn apply_config(&mut self, config: &ListenerConfig) {
        self.tracker.set_default_size(config.default_screen_size);
        self.programs.reconfigure(config);
        self.rebuild_regions(config);
    }

    /// Recompute regions for the current layout
    pub fn rebuild_regions(&mut self, config: &ListenerConfig) {
        self.regions = RegionFilter::new(
            self.tracker.layout(),
            &config.mouse_regions_of_interest,
            &config.mouse_regions_of_disinterest,
        );
    }

    /// Run one raw event through the chain
    pub fn process(
        &mut self,
        event: RawInputEvent,
        flags: &CaptureFlags,
        config: &ListenerConfig,
    ) -> Vec<Record> {
        let RawInputEvent {
            input,
            stamp,
            day,
            pid,
        } = event;

        let mouse = match input {
            RawInput::KeyFilter {
                vk,
                scan_code,
                flags: bits,
            } => {
                self.normalizer.filter(vk, scan_code, bits);
                return Vec::new();
            }
            RawInput::Key { key, pressed } => {
                let mut out = Vec::new();
                let outputs = self.normalizer.process(&key, pressed, config);
                if outputs.is_empty() {
                    return out;
                }
                let program = self.programs.resolve(pid);
                for output in outputs {
                    if !flags.is_category_enabled(output.category)
                        || self.programs.is_blocked(program.as_deref(), output.category)
                    {
                        continue;
                    }
                    let event = InputEvent::Key(KeyEvent {
                        category: output.category,
                        key: output.event.key,
                        realkey: output.event.realkey,
                        stamp,
                        day,
                        program: program.clone(),
                    });
                    out.extend(self.reducer.reduce(event, &mut self.tracker, config));
                }
                return out;
            }
            RawInput::MouseMove { x, y } => MouseInput {
                category: Category::Moves,
                x,
                y,
                button: None,
                dx: None,
                dy: None,
            },
            RawInput::MouseClick {
                x,
                y,
                button,
                pressed,
            } => {
                if !pressed {
                    return Vec::new();
                }
                MouseInput {
                    category: Category::Clicks,
                    x,
                    y,
                    button: Some(button.index()),
                    dx: None,
                    dy: None,
                }
            }
            RawInput::MouseScroll { x, y, dx, dy } => MouseInput {
                category: Category::Scrolls,
                x,
                y,
                button: None,
                dx: Some(dx),
                dy: Some(dy),
            },
        };
        self.process_mouse(mouse, stamp, day, pid, flags, config)
    }

    fn process_mouse(
        &mut self,
        mouse: MouseInput,
        stamp: f64,
        day: NaiveDate,
        pid: Option<u32>,
        flags: &CaptureFlags,
        config: &ListenerConfig,
    ) -> Vec<Record> {
        if !flags.is_category_enabled(mouse.category) {
            return Vec::new();
        }
        let (display, _) = self.tracker.resolve_display(mouse.x, mouse.y);
        if self.regions.is_ignored(mouse.x, mouse.y, display) {
            return Vec::new();
        }
        let program = self.programs.resolve(pid);
        if self.programs.is_blocked(program.as_deref(), mouse.category) {
            return Vec::new();
        }

        let event = InputEvent::Mouse(MouseEvent {
            category: mouse.category,
            x: mouse.x,
            y: mouse.y,
            display,
            button: mouse.button,
            dx: mouse.dx,
            dy: mouse.dy,
            stamp,
            day,
            program,
        });
        self.reducer.reduce(event, &mut self.tracker, config)
    }

    pub fn flush_expired(&mut self, now: f64, config: &ListenerConfig) -> Vec<Record> {
        self.reducer.flush_expired(now, config)
    }

    pub fn flush_all(&mut self) -> Vec<Record> {
        self.reducer.flush_all()
    }
}
