//! Keyboard decoding: canonical key names, modifier state and combos

pub mod modifiers;
pub mod normalizer;
pub mod tables;

pub use modifiers::ModifierState;
pub use normalizer::{KeyNormalizer, KeyOutput, Platform};
