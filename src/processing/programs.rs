//! Program attribution and filtering
//!
//! Events carry the pid of the foreground process. Here that pid becomes an
//! executable path, checked against the configured black and white lists.

use crate::capture::programs::ExeLookup;
use crate::capture::types::Category;
use crate::config::ListenerConfig;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

/// Case-insensitive matcher for a list entry.
///
/// Entries without a path separator match any path ending in them, and `*`
/// matches any run of characters.
pub fn program_regex(entry: &str) -> Result<Regex, regex::Error> {
    let prefix = if entry.contains(['/', '\\']) {
        "^"
    } else {
        r"^(.*[/\\])?"
    };
    let body = entry
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    RegexBuilder::new(&format!("{}{}$", prefix, body))
        .case_insensitive(true)
        .build()
}

/// Compiled list entry
struct ProgramPattern {
    regex: Regex,
    /// Input or category names, all when empty
    scope: Vec<String>,
}

impl ProgramPattern {
    fn compile(list: &BTreeMap<String, Vec<String>>) -> Vec<Self> {
        list.iter()
            .filter_map(|(entry, scope)| match program_regex(entry) {
                Ok(regex) => Some(Self {
                    regex,
                    scope: scope.iter().map(|s| s.to_lowercase()).collect(),
                }),
                Err(e) => {
                    tracing::warn!("Ignoring program entry {:?}: {}", entry, e);
                    None
                }
            })
            .collect()
    }

    fn applies(&self, exe: &str, category: Category) -> bool {
        self.regex.is_match(exe)
            && (self.scope.is_empty()
                || self
                    .scope
                    .iter()
                    .any(|s| s == category.as_str() || s == category.input().as_str()))
    }
}

/// Black and white lists from the configuration
#[derive(Default)]
pub struct ProgramFilter {
    blacklist: Vec<ProgramPattern>,
    whitelist: Vec<ProgramPattern>,
}

impl ProgramFilter {
    pub fn new(config: &ListenerConfig) -> Self {
        Self {
            blacklist: ProgramPattern::compile(&config.program_blacklist),
            whitelist: ProgramPattern::compile(&config.program_whitelist),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blacklist.is_empty() && self.whitelist.is_empty()
    }

    /// Whether input of `category` from program `exe` is dropped.
    ///
    /// Blacklisting wins over whitelisting. With a whitelist, programs that
    /// are unknown or not listed for the category are dropped.
    pub fn is_blocked(&self, exe: Option<&str>, category: Category) -> bool {
        if self.is_empty() {
            return false;
        }
        let Some(exe) = exe else {
            return !self.whitelist.is_empty();
        };
        if self.blacklist.iter().any(|p| p.applies(exe, category)) {
            return true;
        }
        if self.whitelist.iter().any(|p| p.applies(exe, category)) {
            return false;
        }
        !self.whitelist.is_empty()
    }
}

/// Pid to program resolution plus filtering, owned by the pipeline
pub struct Programs {
    enabled: bool,
    lookup: Option<Box<dyn ExeLookup>>,
    filter: ProgramFilter,
}

impl Programs {
    pub fn new(config: &ListenerConfig) -> Self {
        Self {
            enabled: config.programs_enabled,
            lookup: None,
            filter: ProgramFilter::new(config),
        }
    }

    pub fn set_lookup(&mut self, lookup: Box<dyn ExeLookup>) {
        self.lookup = Some(lookup);
    }

    pub fn reconfigure(&mut self, config: &ListenerConfig) {
        self.enabled = config.programs_enabled;
        self.filter = ProgramFilter::new(config);
    }

    /// Executable of a process, when attribution is on and a lookup is set
    pub fn resolve(&mut self, pid: Option<u32>) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.lookup.as_mut()?.exe_path(pid?)
    }

    pub fn is_blocked(&self, exe: Option<&str>, category: Category) -> bool {
        self.enabled && self.lookup.is_some() && self.filter.is_blocked(exe, category)
    }
}
