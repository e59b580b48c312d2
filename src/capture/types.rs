use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event categories, one storage table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Moves,
    Clicks,
    Scrolls,
    Keys,
    Combos,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Moves,
        Category::Clicks,
        Category::Scrolls,
        Category::Keys,
        Category::Combos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Moves => "moves",
            Category::Clicks => "clicks",
            Category::Scrolls => "scrolls",
            Category::Keys => "keys",
            Category::Combos => "combos",
        }
    }

    /// The input device this category is captured from
    pub fn input(&self) -> InputKind {
        match self {
            Category::Moves | Category::Clicks | Category::Scrolls => InputKind::Mouse,
            Category::Keys | Category::Combos => InputKind::Keyboard,
        }
    }

    pub fn is_mouse(&self) -> bool {
        self.input() == InputKind::Mouse
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category {:?}", s))
    }
}

/// Input devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Mouse,
    Keyboard,
}

impl InputKind {
    pub const ALL: [InputKind; 2] = [InputKind::Mouse, InputKind::Keyboard];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Mouse => "mouse",
            InputKind::Keyboard => "keyboard",
        }
    }

    pub fn categories(&self) -> &'static [Category] {
        match self {
            InputKind::Mouse => &[Category::Moves, Category::Clicks, Category::Scrolls],
            InputKind::Keyboard => &[Category::Keys, Category::Combos],
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputKind::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown input {:?}", s))
    }
}

/// Mouse buttons, stored by index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Unknown,
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    pub fn index(&self) -> u8 {
        match self {
            MouseButton::Unknown => 0,
            MouseButton::Left => 1,
            MouseButton::Right => 2,
            MouseButton::Middle => 3,
            MouseButton::Back => 4,
            MouseButton::Forward => 5,
        }
    }
}

/// Key as reported by the OS hook.
///
/// `name` is set for special keys the hook knows symbolically ("ctrl_l",
/// "page_up", "KP_Home"), `ch` is the produced character if any, `vk` the
/// platform virtual-key code or keysym.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKey {
    pub name: Option<String>,
    pub ch: Option<char>,
    pub vk: Option<u32>,
    pub scan_code: Option<u32>,
    /// Extended-key bit when the hook delivers it inline with the event
    pub extended: Option<bool>,
}

impl RawKey {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn code(ch: Option<char>, vk: Option<u32>) -> Self {
        Self {
            ch,
            vk,
            ..Default::default()
        }
    }

    pub fn with_vk(mut self, vk: u32) -> Self {
        self.vk = Some(vk);
        self
    }

    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = Some(extended);
        self
    }
}

/// One raw input transition from an OS hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawInput {
    /// Low-level keyboard hook data preceding the next key event (Windows)
    KeyFilter { vk: u32, scan_code: u32, flags: u32 },
    Key { key: RawKey, pressed: bool },
    MouseMove { x: f64, y: f64 },
    MouseClick { x: f64, y: f64, button: MouseButton, pressed: bool },
    MouseScroll { x: f64, y: f64, dx: f64, dy: f64 },
}

impl RawInput {
    pub fn input(&self) -> InputKind {
        match self {
            RawInput::KeyFilter { .. } | RawInput::Key { .. } => InputKind::Keyboard,
            _ => InputKind::Mouse,
        }
    }
}

/// Raw input stamped at enqueue time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInputEvent {
    pub input: RawInput,
    /// UNIX time in seconds
    pub stamp: f64,
    pub day: NaiveDate,
    /// Process owning the foreground window when the event was enqueued
    pub pid: Option<u32>,
}

impl RawInputEvent {
    pub fn now(input: RawInput) -> Self {
        let (stamp, day) = now_stamp();
        Self {
            input,
            stamp,
            day,
            pid: None,
        }
    }

    pub fn at(input: RawInput, stamp: f64) -> Self {
        Self {
            input,
            stamp,
            day: stamp_to_day(stamp),
            pid: None,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }
}

/// Decoded key in canonical naming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalKeyEvent {
    /// Display label, may depend on held modifiers ("Ctrl-Alt-A")
    pub key: String,
    /// Physical key path ("Lcontrol-Alt-A")
    pub realkey: String,
    pub pressed: bool,
}

/// Key event ready for reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub category: Category,
    pub key: String,
    pub realkey: String,
    pub stamp: f64,
    pub day: NaiveDate,
    /// Executable of the foreground program
    pub program: Option<String>,
}

/// Mouse event with its display resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub category: Category,
    pub x: f64,
    pub y: f64,
    pub display: usize,
    pub button: Option<u8>,
    pub dx: Option<f64>,
    pub dy: Option<f64>,
    pub stamp: f64,
    pub day: NaiveDate,
    pub program: Option<String>,
}

/// Normalized event handed to the reducer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    Mouse(MouseEvent),
    Key(KeyEvent),
}

impl InputEvent {
    pub fn category(&self) -> Category {
        match self {
            InputEvent::Mouse(m) => m.category,
            InputEvent::Key(k) => k.category,
        }
    }

    pub fn stamp(&self) -> f64 {
        match self {
            InputEvent::Mouse(m) => m.stamp,
            InputEvent::Key(k) => k.stamp,
        }
    }
}

/// Current UNIX time in seconds, with the local calendar day
pub fn now_stamp() -> (f64, NaiveDate) {
    let now = Local::now();
    (now.timestamp_micros() as f64 / 1_000_000.0, now.date_naive())
}

/// Local calendar day of a UNIX timestamp
pub fn stamp_to_day(stamp: f64) -> NaiveDate {
    let micros = (stamp * 1_000_000.0) as i64;
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.with_timezone(&Local).date_naive())
        .unwrap_or_default()
}
