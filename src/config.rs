//! Listener configuration
//!
//! Values are owned by the host process and read by the pipeline. They can be
//! replaced wholesale or changed one field at a time with `configure`.

use crate::display::regions::RegionEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown configuration option: {0}")]
    UnknownOption(String),

    #[error("Invalid value for {name}: {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} only takes effect when the listener is restarted")]
    RestartRequired(String),
}

/// Options fixed for the lifetime of a running listener
const RESTART_ONLY: &[&str] = &["max_events_for_queue"];

/// Tunables for capture, coalescing and storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Max seconds between moves for them to be joined into one line
    pub mouse_move_join_interval: f64,

    /// Max cross-product deviation, in heatmap cells, for moves to count as collinear
    pub mouse_move_join_radius: f64,

    /// Max seconds between scrolls in the same direction for them to be summed
    pub mouse_scroll_join_interval: f64,

    /// Max seconds between keypresses to count as one typing session
    pub keyboard_session_max_delta: f64,

    /// Heatmap grid size that mouse positions are rescaled into
    pub mouse_heatmap_size: (u32, u32),

    /// Screen size used before any display layout is known
    pub default_screen_size: (u32, u32),

    /// Max raw events waiting in the capture queue, newer events are dropped beyond this
    pub max_events_for_queue: usize,

    /// Seconds to sleep between write cycles
    pub events_write_interval: f64,

    /// Whether repeated press events are suppressed for all keys, not only modifiers and locks
    pub keyboard_sticky_enabled: bool,

    /// Whether modifier combinations are recorded
    pub keyboard_combos_enabled: bool,

    /// Names overriding the decoded name for given virtual-key codes
    pub custom_keys: BTreeMap<u32, String>,

    /// Mouse events are only recorded inside these areas, if any given
    pub mouse_regions_of_interest: Vec<RegionEntry>,

    /// Mouse events inside these areas are not recorded
    pub mouse_regions_of_disinterest: Vec<RegionEntry>,

    /// Max records kept for retry while storage is failing, oldest are dropped beyond this
    pub max_pending_writes: usize,

    /// Consecutive failed write cycles after which the host is warned
    pub storage_failure_warn_after: u32,

    /// Keypress timestamps retained for typing session statistics
    pub key_history_limit: usize,

    /// Whether events are attributed to the foreground program
    pub programs_enabled: bool,

    /// Programs whose input is not recorded, as executable path or name
    /// pattern mapped to the inputs or categories blocked (all when empty)
    pub program_blacklist: BTreeMap<String, Vec<String>>,

    /// If any given, input is only recorded from these programs
    pub program_whitelist: BTreeMap<String, Vec<String>>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            mouse_move_join_interval: 0.5,
            mouse_move_join_radius: 5.0,
            mouse_scroll_join_interval: 0.5,
            keyboard_session_max_delta: 3.0,
            mouse_heatmap_size: (640, 360),
            default_screen_size: (1920, 1080),
            max_events_for_queue: 1000,
            events_write_interval: 5.0,
            keyboard_sticky_enabled: false,
            keyboard_combos_enabled: true,
            custom_keys: BTreeMap::new(),
            mouse_regions_of_interest: Vec::new(),
            mouse_regions_of_disinterest: Vec::new(),
            max_pending_writes: 100_000,
            storage_failure_warn_after: 10,
            key_history_limit: 10_000,
            programs_enabled: true,
            program_blacklist: BTreeMap::new(),
            program_whitelist: BTreeMap::new(),
        }
    }
}

impl ListenerConfig {
    /// Set a single option from its JSON representation.
    ///
    /// Accepts both `mouse_move_join_interval` and `MouseMoveJoinInterval` forms.
    pub fn configure(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let field = snake_case(name);

        let mut tree = serde_json::to_value(&*self).map_err(|source| ConfigError::InvalidValue {
            name: field.clone(),
            source,
        })?;
        let object = tree
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownOption(name.to_string()))?;
        if !object.contains_key(&field) {
            return Err(ConfigError::UnknownOption(name.to_string()));
        }
        if RESTART_ONLY.contains(&field.as_str()) {
            return Err(ConfigError::RestartRequired(name.to_string()));
        }

        let parsed: serde_json::Value =
            serde_json::from_str(value).map_err(|source| ConfigError::InvalidValue {
                name: field.clone(),
                source,
            })?;
        object.insert(field.clone(), parsed);

        *self = serde_json::from_value(tree)
            .map_err(|source| ConfigError::InvalidValue { name: field, source })?;
        Ok(())
    }
}

/// "MouseMoveJoinInterval" -> "mouse_move_join_interval"; snake case passes through.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_pascal_case_name() {
        let mut config = ListenerConfig::default();
        config.configure("MouseMoveJoinInterval", "0.25").unwrap();
        assert_eq!(config.mouse_move_join_interval, 0.25);
    }

    #[test]
    fn test_configure_structured_value() {
        let mut config = ListenerConfig::default();
        config.configure("mouse_heatmap_size", "[320, 180]").unwrap();
        config.configure("custom_keys", r#"{"255": "Fn"}"#).unwrap();
        assert_eq!(config.mouse_heatmap_size, (320, 180));
        assert_eq!(config.custom_keys.get(&255).map(String::as_str), Some("Fn"));
    }

    #[test]
    fn test_configure_rejects_unknown_and_invalid() {
        let mut config = ListenerConfig::default();
        assert!(matches!(
            config.configure("NoSuchThing", "1"),
            Err(ConfigError::UnknownOption(_))
        ));
        assert!(matches!(
            config.configure("KeyboardCombosEnabled", "\"maybe\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        // Failed update leaves the config untouched
        assert_eq!(config, ListenerConfig::default());
    }

    #[test]
    fn test_configure_queue_size_needs_restart() {
        let mut config = ListenerConfig::default();
        assert!(matches!(
            config.configure("MaxEventsForQueue", "50"),
            Err(ConfigError::RestartRequired(_))
        ));
        assert_eq!(config.max_events_for_queue, 1000);
    }

    #[test]
    fn test_configure_program_lists() {
        let mut config = ListenerConfig::default();
        config
            .configure("ProgramBlacklist", r#"{"keepass*.exe": ["keyboard"], "vlc": []}"#)
            .unwrap();
        assert_eq!(
            config.program_blacklist.get("keepass*.exe"),
            Some(&vec!["keyboard".to_string()])
        );
        assert_eq!(config.program_blacklist.get("vlc"), Some(&Vec::new()));
    }
}
