//! Processing of captured input
//!
//! The pipeline decodes raw events, attributes events to displays and
//! programs, and reduces everything into storage records. Typing sessions are derived from
//! the keypress stream on demand.

pub mod pipeline;
pub mod programs;
pub mod reducer;
pub mod sessions;

pub use pipeline::Pipeline;
pub use programs::{ProgramFilter, Programs};
pub use reducer::{EventReducer, ReduceError, ReducerState};
pub use sessions::{segment_sessions, Session, SessionStats};
