//! Input capture
//!
//! Raw event types, the capture flags shared with hook threads, foreground
//! program lookups and the bounded queue that hands events to the consumer.

pub mod flags;
pub mod hooks;
pub mod programs;
pub mod queue;
pub mod types;

pub use flags::{CaptureFlags, CaptureTarget};
pub use hooks::{HookError, HookResult, InputHook};
pub use programs::{ExeLookup, ForegroundPid, SystemExeLookup, SystemForeground};
pub use queue::{event_queue, EventConsumer, EventProducer};
pub use types::{Category, InputKind, MouseButton, RawInput, RawInputEvent, RawKey};

#[cfg(feature = "os-hooks")]
pub use hooks::RdevHook;
