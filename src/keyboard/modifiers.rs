//! Modifier key state
//!
//! Tracks which physical modifier keys are down. The logical view (Ctrl, Alt,
//! AltGr, Shift, Win) is derived from the physical one, so releasing one of
//! two held Shift keys keeps Shift active.

/// Logical modifiers in combo label order
pub const LOGICAL_ORDER: [&str; 5] = ["Ctrl", "Alt", "AltGr", "Shift", "Win"];

/// Physical modifiers in combo realkey order, with their logical modifier
const PHYSICAL: [(&str, &str); 8] = [
    ("Lcontrol", "Ctrl"),
    ("Rcontrol", "Ctrl"),
    ("Lshift", "Shift"),
    ("Rshift", "Shift"),
    ("Alt", "Alt"),
    ("Lwin", "Win"),
    ("Rwin", "Win"),
    ("AltGr", "AltGr"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierState {
    held: [bool; PHYSICAL.len()],
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition of `realkey`. Returns false if it is not a modifier.
    pub fn update(&mut self, realkey: &str, pressed: bool) -> bool {
        match PHYSICAL.iter().position(|(name, _)| *name == realkey) {
            Some(index) => {
                self.held[index] = pressed;
                true
            }
            None => false,
        }
    }

    /// Whether a logical modifier ("Ctrl", "Shift", ..) is held
    pub fn is_held(&self, logical: &str) -> bool {
        PHYSICAL
            .iter()
            .zip(self.held)
            .any(|((_, l), down)| down && *l == logical)
    }

    pub fn is_physical_held(&self, realkey: &str) -> bool {
        PHYSICAL
            .iter()
            .zip(self.held)
            .any(|((name, _), down)| down && *name == realkey)
    }

    /// Held logical modifiers joined with "-", e.g. "Ctrl-Alt"
    pub fn logical_prefix(&self) -> String {
        LOGICAL_ORDER
            .iter()
            .filter(|m| self.is_held(m))
            .copied()
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Held physical modifiers joined with "-", e.g. "Lcontrol-Alt"
    pub fn physical_prefix(&self) -> String {
        PHYSICAL
            .iter()
            .zip(self.held)
            .filter(|(_, down)| *down)
            .map(|((name, _), _)| *name)
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Prefix for a combo, if the held modifiers make one. Shift alone does not.
    pub fn combo_prefix(&self) -> Option<(String, String)> {
        let logical = self.logical_prefix();
        if logical.is_empty() || logical == "Shift" {
            return None;
        }
        Some((logical, self.physical_prefix()))
    }

    pub fn clear(&mut self) {
        self.held = Default::default();
    }
}
