//! Static key naming tables

use phf::{phf_map, phf_set};

/// Control characters and their names
pub static CONTROL_CODES: phf::Map<char, &'static str> = phf_map! {
    '\u{00}' => "Nul",
    '\u{01}' => "Start-Of-Header",
    '\u{02}' => "Start-Of-Text",
    '\u{03}' => "Break",
    '\u{04}' => "End-Of-Transmission",
    '\u{05}' => "Enquiry",
    '\u{06}' => "Ack",
    '\u{07}' => "Bell",
    '\u{08}' => "Backspace",
    '\u{09}' => "Tab",
    '\u{0a}' => "Linefeed",
    '\u{0b}' => "Vertical-Tab",
    '\u{0c}' => "Form-Fe",
    '\u{0d}' => "Enter",
    '\u{0e}' => "Shift-In",
    '\u{0f}' => "Shift-Out",
    '\u{10}' => "Data-Link-Escape",
    '\u{11}' => "Devicecontrol1",
    '\u{12}' => "Devicecontrol2",
    '\u{13}' => "Devicecontrol3",
    '\u{14}' => "Devicecontrol4",
    '\u{15}' => "Nak",
    '\u{16}' => "Syn",
    '\u{17}' => "End-Of-Transmission-Block",
    '\u{18}' => "Break",
    '\u{19}' => "End-Of-Medium",
    '\u{1a}' => "Substitute",
    '\u{1b}' => "Escape",
    '\u{1c}' => "File-Separator",
    '\u{1d}' => "Group-Separator",
    '\u{1e}' => "Record-Separator",
    '\u{1f}' => "Unit-Separator",
    '\u{20}' => "Space",
    '\u{7f}' => "Del",
    '\u{a0}' => "Non-Breaking Space",
};

/// Navigation keys the OS reports identically for the numpad, with the
/// extended-bit value that marks the numpad variant
pub static NUMPAD_SPECIALS: &[(&str, bool)] = &[
    ("Insert", false),
    ("Delete", false),
    ("Home", false),
    ("End", false),
    ("PageUp", false),
    ("PageDown", false),
    ("Up", false),
    ("Down", false),
    ("Left", false),
    ("Right", false),
    ("Clear", false),
    ("Enter", true),
];

/// Characters that only the numpad produces without a virtual-key code
pub static NUMPAD_CHARS: phf::Map<char, &'static str> = phf_map! {
    '0' => "Numpad0",
    '1' => "Numpad1",
    '2' => "Numpad2",
    '3' => "Numpad3",
    '4' => "Numpad4",
    '5' => "Numpad5",
    '6' => "Numpad6",
    '7' => "Numpad7",
    '8' => "Numpad8",
    '9' => "Numpad9",
    '/' => "Numpad-Divide",
    '*' => "Numpad-Multiply",
    '-' => "Numpad-Subtract",
    '+' => "Numpad-Add",
};

/// Physical modifier key -> logical modifier
pub static MODIFIER_NAMES: phf::Map<&'static str, &'static str> = phf_map! {
    "Lcontrol" => "Ctrl",
    "Rcontrol" => "Ctrl",
    "Lshift" => "Shift",
    "Rshift" => "Shift",
    "Alt" => "Alt",
    "AltGr" => "AltGr",
    "Lwin" => "Win",
    "Rwin" => "Win",
};

/// Alternate key names -> canonical name
pub static RENAMES: phf::Map<&'static str, &'static str> = phf_map! {
    "Prior" => "PageUp",
    "Next" => "PageDown",
    "Lmenu" => "Alt",
    "Rmenu" => "AltGr",
    "Apps" => "Menu",
    "Return" => "Enter",
    "Back" => "Backspace",
    "Capital" => "CapsLock",
    "Numlock" => "NumLock",
    "Snapshot" => "PrintScreen",
    "Scroll" => "ScrollLock",
    "Decimal" => "Numpad-Decimal",
    "Divide" => "Numpad-Divide",
    "Subtract" => "Numpad-Subtract",
    "Multiply" => "Numpad-Multiply",
    "Add" => "Numpad-Add",
    "Cancel" => "Break",
    "Control_L" => "Lcontrol",
    "Control_R" => "Rcontrol",
    "Alt_L" => "Alt",
    "Shift_L" => "Lshift",
    "Shift_R" => "Rshift",
    "Super_L" => "Lwin",
    "Super_R" => "Rwin",
    "BackSpace" => "Backspace",
    "L1" => "F11",
    "L2" => "F12",
    "Page_Up" => "PageUp",
    "Print" => "PrintScreen",
    "Scroll_Lock" => "ScrollLock",
    "Caps_Lock" => "CapsLock",
    "Num_Lock" => "NumLock",
    "Begin" => "Clear",
    "Super" => "Win",
    "Mode_switch" => "AltGr",
};

/// Keys whose repeated same-state events are spurious redeliveries
pub static STICKY_KEYS: phf::Set<&'static str> = phf_set! {
    "Lcontrol",
    "Rcontrol",
    "Lshift",
    "Rshift",
    "Alt",
    "AltGr",
    "Lwin",
    "Rwin",
    "ScrollLock",
    "CapsLock",
    "NumLock",
    "Break",
};

/// Hook symbolic names that do not map to their Pascal-cased form
pub static HOOK_NAMES: phf::Map<&'static str, &'static str> = phf_map! {
    "alt" => "Alt",
    "alt_l" => "Alt",
    "alt_r" => "AltGr",
    "alt_gr" => "AltGr",
    "cmd" => "Lwin",
    "cmd_l" => "Lwin",
    "cmd_r" => "Rwin",
    "ctrl" => "Lcontrol",
    "ctrl_l" => "Lcontrol",
    "ctrl_r" => "Rcontrol",
    "esc" => "Escape",
    "shift" => "Lshift",
    "shift_l" => "Lshift",
    "shift_r" => "Rshift",
    "pause" => "Break",
};

/// Windows virtual-key codes for numpad, OEM and extra keys
pub static WINDOWS_VK_NAMES: phf::Map<u32, &'static str> = phf_map! {
    226u32 => "Oem_102",
    188u32 => "Oem_Comma",
    190u32 => "Oem_Period",
    221u32 => "Oem_6",
    186u32 => "Oem_1",
    191u32 => "Oem_2",
    220u32 => "Oem_5",
    192u32 => "Oem_3",
    219u32 => "Oem_4",
    222u32 => "Oem_7",
    189u32 => "Oem_Minus",
    187u32 => "Oem_Plus",
    96u32 => "Numpad0",
    97u32 => "Numpad1",
    98u32 => "Numpad2",
    99u32 => "Numpad3",
    100u32 => "Numpad4",
    101u32 => "Numpad5",
    102u32 => "Numpad6",
    103u32 => "Numpad7",
    104u32 => "Numpad8",
    105u32 => "Numpad9",
    12u32 => "Numpad-Clear",
    106u32 => "Numpad-Multiply",
    107u32 => "Numpad-Add",
    109u32 => "Numpad-Subtract",
    110u32 => "Numpad-Delete",
    111u32 => "Numpad-Divide",
    21u32 => "IME Hangul/Kana",
    23u32 => "IME Junja",
    24u32 => "IME final",
    25u32 => "IME Hanja/Kanji",
    172u32 => "Web/Home",
    173u32 => "Volume Mute",
    174u32 => "Volume Down",
    175u32 => "Volume Up",
    176u32 => "Media Next",
    177u32 => "Media Prev",
    178u32 => "Media Stop",
    179u32 => "Media Play/Pause",
    180u32 => "Email",
    181u32 => "Media Select",
    182u32 => "Application 1",
    183u32 => "Application 2",
};

/// X11 keysyms without a character or symbolic name
pub static X11_VK_NAMES: phf::Map<u32, &'static str> = phf_map! {
    65027u32 => "AltGr",
    65437u32 => "Numpad-Clear",
    269025041u32 => "MediaVolumeDown",
    269025042u32 => "MediaVolumeMute",
    269025043u32 => "MediaVolumeUp",
    269025044u32 => "MediaPlayPause",
    269025048u32 => "Web/Home",
    269025049u32 => "Email",
    269025053u32 => "Calculator",
    269025074u32 => "Media",
};

/// macOS keypad virtual-key codes
pub static MACOS_VK_NAMES: phf::Map<u32, &'static str> = phf_map! {
    65u32 => "Numpad-Decimal",
    67u32 => "Numpad-Multiply",
    69u32 => "Numpad-Add",
    71u32 => "Numpad-Clear",
    75u32 => "Numpad-Divide",
    76u32 => "Numpad-Enter",
    78u32 => "Numpad-Subtract",
    81u32 => "Numpad-Equal",
    82u32 => "Numpad0",
    83u32 => "Numpad1",
    84u32 => "Numpad2",
    85u32 => "Numpad3",
    86u32 => "Numpad4",
    87u32 => "Numpad5",
    88u32 => "Numpad6",
    89u32 => "Numpad7",
    91u32 => "Numpad8",
    92u32 => "Numpad9",
};

pub fn is_modifier(name: &str) -> bool {
    MODIFIER_NAMES.contains_key(name)
}

pub fn is_sticky(name: &str) -> bool {
    STICKY_KEYS.contains(name)
}

/// Zero-padded hex of a raw code, whole bytes wide: 12 -> "0x0C", 256 -> "0x0100"
pub fn zhex(value: u32) -> String {
    if value == 0 {
        return "0x00".to_string();
    }
    let bits = 32 - value.leading_zeros();
    let width = 2 * (1 + (bits - 1) / 8) as usize;
    format!("0x{:0width$X}", value, width = width)
}

/// Snake case to Pascal case: "alt_gr" -> "AltGr", "page_up" -> "PageUp"
pub fn nicename(name: &str) -> String {
    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zhex_widths() {
        assert_eq!(zhex(0), "0x00");
        assert_eq!(zhex(12), "0x0C");
        assert_eq!(zhex(255), "0xFF");
        assert_eq!(zhex(256), "0x0100");
        assert_eq!(zhex(65536), "0x010000");
    }

    #[test]
    fn test_nicename() {
        assert_eq!(nicename("alt_gr"), "AltGr");
        assert_eq!(nicename("page_down"), "PageDown");
        assert_eq!(nicename("f11"), "F11");
        assert_eq!(nicename("media_volume_up"), "MediaVolumeUp");
    }

    #[test]
    fn test_modifier_and_sticky_membership() {
        assert!(is_modifier("Rcontrol"));
        assert!(!is_modifier("Ctrl"));
        assert!(is_sticky("CapsLock"));
        assert!(is_sticky("Break"));
        assert!(!is_sticky("A"));
    }
}
