//! Host-facing listener: control commands and the consumer service

pub mod commands;
pub mod service;

pub use commands::{ClearTarget, Command, CommandError};
pub use service::{
    CommandOutcome, CounterSnapshot, Listener, ListenerBuilder, ListenerError, ListenerResult,
};
