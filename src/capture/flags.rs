//! Which inputs and event categories are being captured
//!
//! Shared between hook threads (input gating) and the consumer (category
//! gating), so every flag is atomic.

use crate::capture::types::{Category, InputKind};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Target of a `start`/`stop` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    Input(InputKind),
    Category(Category),
}

impl FromStr for CaptureTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(input) = s.parse::<InputKind>() {
            return Ok(CaptureTarget::Input(input));
        }
        s.parse::<Category>().map(CaptureTarget::Category)
    }
}

#[derive(Debug)]
pub struct CaptureFlags {
    mouse: AtomicBool,
    keyboard: AtomicBool,
    categories: [AtomicBool; 5],
}

impl CaptureFlags {
    pub fn new(enabled: bool) -> Self {
        Self {
            mouse: AtomicBool::new(enabled),
            keyboard: AtomicBool::new(enabled),
            categories: std::array::from_fn(|_| AtomicBool::new(enabled)),
        }
    }

    fn input_flag(&self, input: InputKind) -> &AtomicBool {
        match input {
            InputKind::Mouse => &self.mouse,
            InputKind::Keyboard => &self.keyboard,
        }
    }

    fn category_flag(&self, category: Category) -> &AtomicBool {
        let index = Category::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or_default();
        &self.categories[index]
    }

    pub fn is_input_enabled(&self, input: InputKind) -> bool {
        self.input_flag(input).load(Ordering::Relaxed)
    }

    /// Category is captured only while its input is also on
    pub fn is_category_enabled(&self, category: Category) -> bool {
        self.is_input_enabled(category.input())
            && self.category_flag(category).load(Ordering::Relaxed)
    }

    fn is_set(&self, target: CaptureTarget) -> bool {
        match target {
            CaptureTarget::Input(input) => self.is_input_enabled(input),
            CaptureTarget::Category(c) => self.category_flag(c).load(Ordering::Relaxed),
        }
    }

    fn set(&self, target: CaptureTarget, on: bool) {
        match target {
            CaptureTarget::Input(input) => self.input_flag(input).store(on, Ordering::Relaxed),
            CaptureTarget::Category(c) => self.category_flag(c).store(on, Ordering::Relaxed),
        }
    }

    /// Apply a start/stop toggle, keeping inputs and their categories consistent.
    ///
    /// Starting a category while its input is off leaves only that category on.
    /// Stopping the last category of an input turns the input off, and starting
    /// an input whose categories are all off turns them all on.
    pub fn toggle(&self, target: CaptureTarget, start: bool) {
        let mut on = start;
        let parent = match target {
            CaptureTarget::Category(c) => Some(c.input()),
            CaptureTarget::Input(_) => None,
        };

        if let Some(input) = parent {
            if !self.is_input_enabled(input) {
                on = true;
                for c in input.categories() {
                    self.set(CaptureTarget::Category(*c), false);
                }
            }
        }
        self.set(target, on);

        let input = match target {
            CaptureTarget::Input(input) => input,
            CaptureTarget::Category(c) => c.input(),
        };
        if parent.is_some() && on {
            self.set(CaptureTarget::Input(input), true);
        } else if !input
            .categories()
            .iter()
            .any(|c| self.is_set(CaptureTarget::Category(*c)))
        {
            if parent.is_none() && on {
                for c in input.categories() {
                    self.set(CaptureTarget::Category(*c), true);
                }
            } else if parent.is_some() && !on {
                self.set(CaptureTarget::Input(input), false);
            }
        }
    }
}

impl Default for CaptureFlags {
    fn default() -> Self {
        Self::new(true)
    }
}
