//! Foreground program lookup
//!
//! Hooks ask which process owns the focused window as each event is
//! enqueued. The consumer later resolves that process to its executable.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

/// How long a foreground lookup is reused, it runs for every input event
const FOREGROUND_TTL: Duration = Duration::from_millis(250);

/// How long a resolved executable path is trusted before asking again
const EXE_TTL: Duration = Duration::from_secs(30);

/// Source of the process owning the focused window
pub trait ForegroundPid: Send + Sync {
    fn active_pid(&self) -> Option<u32>;
}

impl<F> ForegroundPid for F
where
    F: Fn() -> Option<u32> + Send + Sync,
{
    fn active_pid(&self) -> Option<u32> {
        self()
    }
}

/// Resolves process ids to executable paths
pub trait ExeLookup: Send {
    fn exe_path(&mut self, pid: u32) -> Option<String>;
}

/// Fixed mapping, e.g. for replaying recorded input
impl ExeLookup for HashMap<u32, String> {
    fn exe_path(&mut self, pid: u32) -> Option<String> {
        self.get(&pid).cloned()
    }
}

/// Focused window of the desktop session: Win32 on Windows, `xprop` on X11
#[derive(Default)]
pub struct SystemForeground {
    cached: Mutex<Option<(Instant, Option<u32>)>>,
}

impl SystemForeground {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether foreground lookups can work on this host
    pub fn is_supported() -> bool {
        #[cfg(windows)]
        {
            true
        }
        #[cfg(not(windows))]
        {
            xprop(&["-version"]).is_some()
        }
    }
}

impl ForegroundPid for SystemForeground {
    fn active_pid(&self) -> Option<u32> {
        let mut cached = self.cached.lock();
        if let Some((at, pid)) = *cached {
            if at.elapsed() < FOREGROUND_TTL {
                return pid;
            }
        }
        let pid = query_foreground();
        *cached = Some((Instant::now(), pid));
        pid
    }
}

#[cfg(windows)]
fn query_foreground() -> Option<u32> {
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

    let mut pid: u32 = 0;
    unsafe {
        let hwnd = GetForegroundWindow();
        GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
    }
    (pid != 0).then_some(pid)
}

#[cfg(not(windows))]
fn query_foreground() -> Option<u32> {
    let window = parse_window_id(&xprop(&["-root", "_NET_ACTIVE_WINDOW"])?)?;
    parse_wm_pid(&xprop(&["-id", &window, "_NET_WM_PID"])?)
}

#[cfg(not(windows))]
fn xprop(args: &[&str]) -> Option<String> {
    let output = std::process::Command::new("xprop").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x300000a` -> `0x300000a`
#[cfg_attr(windows, allow(dead_code))]
fn parse_window_id(output: &str) -> Option<String> {
    let id = output.split_whitespace().last()?;
    match u64::from_str_radix(id.trim_start_matches("0x"), 16) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(id.to_string()),
    }
}

/// `_NET_WM_PID(CARDINAL) = 4059` -> 4059
#[cfg_attr(windows, allow(dead_code))]
fn parse_wm_pid(output: &str) -> Option<u32> {
    output.split_whitespace().last()?.parse().ok()
}

/// Executable paths from the process table, cached per pid
pub struct SystemExeLookup {
    system: System,
    cache: HashMap<u32, (Instant, Option<String>)>,
}

impl SystemExeLookup {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            cache: HashMap::new(),
        }
    }
}

impl Default for SystemExeLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl ExeLookup for SystemExeLookup {
    fn exe_path(&mut self, pid: u32) -> Option<String> {
        if let Some((at, path)) = self.cache.get(&pid) {
            if at.elapsed() < EXE_TTL {
                return path.clone();
            }
        }

        let key = Pid::from_u32(pid);
        let path = if self.system.refresh_process(key) {
            self.system
                .process(key)
                .and_then(|process| process.exe())
                .map(|exe| exe.display().to_string())
        } else {
            None
        };
        if path.is_none() {
            tracing::trace!("No executable for pid {}", pid);
        }
        self.cache.insert(pid, (Instant::now(), path.clone()));
        path
    }
}
