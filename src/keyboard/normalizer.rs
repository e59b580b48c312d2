//! Raw key transitions to canonical key names
//!
//! One `KeyNormalizer` is owned by the consumer thread. It keeps the modifier
//! state, the last seen press state of every key, and the extended-key bit
//! announced by the Windows pre-event filter.

use crate::capture::types::{CanonicalKeyEvent, Category, RawKey};
use crate::config::ListenerConfig;
use crate::keyboard::modifiers::ModifierState;
use crate::keyboard::tables::{
    is_modifier, is_sticky, nicename, zhex, CONTROL_CODES, HOOK_NAMES, MACOS_VK_NAMES,
    NUMPAD_CHARS, NUMPAD_SPECIALS, RENAMES, WINDOWS_VK_NAMES, X11_VK_NAMES,
};
use std::collections::HashMap;

/// Scan code and virtual key of the dummy Lcontrol press that AltGr generates
const ALTGR_DUMMY_SCAN_CODE: u32 = 541;
const ALTGR_DUMMY_VK: u32 = 162;

/// KBDLLHOOKSTRUCT.flags bit 0 is LLKHF_EXTENDED
const LLKHF_EXTENDED: u32 = 0x01;

/// Keyboard code conventions of the OS the hook runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOS,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    /// Whether virtual-key codes for letters and digits equal their ASCII values
    fn has_ascii_vk(&self) -> bool {
        !matches!(self, Platform::MacOS)
    }

    /// Name for a code that carries no character, outside Windows
    fn code_name(&self, vk: u32) -> Option<&'static str> {
        match self {
            Platform::Windows => None,
            Platform::Linux => X11_VK_NAMES.get(&vk).copied(),
            Platform::MacOS => MACOS_VK_NAMES.get(&vk).copied(),
        }
    }
}

/// A canonical event with the table it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutput {
    pub category: Category,
    pub event: CanonicalKeyEvent,
}

#[derive(Debug)]
pub struct KeyNormalizer {
    platform: Platform,
    modifiers: ModifierState,
    /// Last press state per realkey
    downs: HashMap<String, bool>,
    /// Extended bit from the pre-event filter, for the next key event
    pending_extended: Option<bool>,
    /// Next key event is an artifact of AltGr
    skip_next: bool,
}

impl KeyNormalizer {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            modifiers: ModifierState::new(),
            downs: HashMap::new(),
            pending_extended: None,
            skip_next: false,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn modifiers(&self) -> &ModifierState {
        &self.modifiers
    }

    /// Windows low-level hook data announced before the key event itself.
    ///
    /// Returns false if the upcoming event is to be ignored.
    pub fn filter(&mut self, vk: u32, scan_code: u32, flags: u32) -> bool {
        if scan_code == ALTGR_DUMMY_SCAN_CODE && vk == ALTGR_DUMMY_VK {
            self.skip_next = true;
            return false;
        }
        self.pending_extended = Some(flags & LLKHF_EXTENDED != 0);
        true
    }

    /// Decode a raw key into (key, realkey) under the current modifier state.
    ///
    /// Unknown codes fall back to a hex name so that every key is still counted.
    pub fn decode(&self, raw: &RawKey, config: &ListenerConfig) -> (String, String) {
        let extended = raw.extended.or(self.pending_extended);
        let (mut name, mut realname) = self.names(raw, extended);

        if let Some(label) = single_char(&name).and_then(|c| CONTROL_CODES.get(&c)) {
            if let Some(real) = realname
                .as_deref()
                .and_then(single_char_str)
                .and_then(|c| CONTROL_CODES.get(&c))
            {
                realname = Some(real.to_string());
            }
            // Ctrl-Y gives End-Of-Medium, label it by the physical key instead
            name = if self.modifiers.is_held("Ctrl") {
                realname.clone()
            } else {
                Some(label.to_string())
            };
        }

        if let Some(custom) = raw.vk.and_then(|vk| config.custom_keys.get(&vk)) {
            name = Some(custom.clone());
            realname = Some(custom.clone());
        }

        let fallback = || zhex(raw.vk.or(raw.scan_code).unwrap_or_default());
        let realname = realname.or_else(|| name.clone()).unwrap_or_else(fallback);
        let name = name.unwrap_or_else(|| realname.clone());
        (name, realname)
    }

    fn names(&self, raw: &RawKey, extended: Option<bool>) -> (Option<String>, Option<String>) {
        let (ch, vk) = (raw.ch, raw.vk);
        let mut name: Option<String> = None;
        let mut realname: Option<String> = None;

        if let Some(symbolic) = raw.name.as_deref() {
            let label = HOOK_NAMES
                .get(symbolic)
                .map(|s| s.to_string())
                .unwrap_or_else(|| nicename(symbolic));
            let mut label = RENAMES.get(label.as_str()).map(|s| s.to_string()).unwrap_or(label);
            if vk.is_some() && is_numpad_special(&label, extended) {
                label = format!("Numpad-{}", label);
            }
            name = Some(label.clone());
            realname = Some(label);
        } else if let Some(code) = vk.filter(|v| self.platform.has_ascii_vk() && is_ascii_alnum(*v)) {
            // Common A..Z 0..9 keys, whatever the chars
            let base = ascii(code);
            name = Some(ch.map(upper).unwrap_or_else(|| base.clone()));
            realname = Some(base);
        }

        if self.platform != Platform::Windows {
            if name.is_none() {
                let known = vk.and_then(|v| self.platform.code_name(v));
                let label = if let (Platform::MacOS, Some(known)) = (self.platform, known) {
                    // Keypad codes produce plain digit chars on macOS
                    Some(known.to_string())
                } else if let (Some(c), Some(_)) = (ch, vk) {
                    Some(upper(c))
                } else if let Some(numpad) = ch.and_then(|c| NUMPAD_CHARS.get(&c)) {
                    Some(numpad.to_string())
                } else if let Some(known) = known {
                    Some(known.to_string())
                } else {
                    ch.map(upper).or_else(|| vk.filter(|v| *v != 0).map(zhex))
                };
                realname = label.clone();
                name = label;
            }
        } else if let Some(known) = vk.and_then(|v| WINDOWS_VK_NAMES.get(&v)) {
            realname = Some(known.to_string());
            name = match ch {
                Some(c) if known.contains("Oem_") => Some(upper(c)),
                _ => Some(known.to_string()),
            };
        } else if name.is_none() {
            if let (Some(c), Some(code)) = (ch, vk) {
                name = Some(upper(c));
                realname = Some(if is_ascii_digit(code) { ascii(code) } else { zhex(code) });
            }
        }

        (name, realname)
    }

    /// Process one key transition into zero, one or two canonical events.
    pub fn process(&mut self, raw: &RawKey, pressed: bool, config: &ListenerConfig) -> Vec<KeyOutput> {
        if self.skip_next {
            self.skip_next = false;
            self.pending_extended = None;
            return Vec::new();
        }

        let (key, realkey) = self.decode(raw, config);
        self.pending_extended = None;
        self.modifiers.update(&realkey, pressed);

        if (config.keyboard_sticky_enabled || is_sticky(&realkey))
            && self.downs.get(&realkey) == Some(&pressed)
        {
            tracing::trace!("Suppressing repeated {} for {}", pressed, realkey);
            return Vec::new();
        }
        self.downs.insert(realkey.clone(), pressed);
        if !pressed {
            return Vec::new();
        }

        let mut out = vec![KeyOutput {
            category: Category::Keys,
            event: CanonicalKeyEvent {
                key: key.clone(),
                realkey: realkey.clone(),
                pressed,
            },
        }];

        if !is_modifier(&key) && config.keyboard_combos_enabled {
            if let Some((logical, physical)) = self.modifiers.combo_prefix() {
                out.push(KeyOutput {
                    category: Category::Combos,
                    event: CanonicalKeyEvent {
                        key: format!("{}-{}", logical, realkey),
                        realkey: format!("{}-{}", physical, realkey),
                        pressed,
                    },
                });
            }
        }

        out
    }

    /// Forget held keys, e.g. after the keyboard hook was restarted
    pub fn reset(&mut self) {
        self.modifiers.clear();
        self.downs.clear();
        self.pending_extended = None;
        self.skip_next = false;
    }
}

fn is_numpad_special(name: &str, extended: Option<bool>) -> bool {
    extended.is_some_and(|ext| NUMPAD_SPECIALS.iter().any(|(n, e)| *n == name && *e == ext))
}

fn is_ascii_alnum(code: u32) -> bool {
    (u32::from(b'A')..=u32::from(b'Z')).contains(&code) || is_ascii_digit(code)
}

fn is_ascii_digit(code: u32) -> bool {
    (u32::from(b'0')..=u32::from(b'9')).contains(&code)
}

fn ascii(code: u32) -> String {
    char::from_u32(code).map(String::from).unwrap_or_default()
}

fn upper(c: char) -> String {
    c.to_uppercase().collect()
}

fn single_char(s: &Option<String>) -> Option<char> {
    single_char_str(s.as_deref()?)
}

fn single_char_str(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
