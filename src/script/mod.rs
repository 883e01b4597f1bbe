//! Playback Script Module
//!
//! Generates the Luau LocalScript that drives segment playback of the
//! combined track inside the host game engine.

pub mod generator;
pub mod naming;

pub use generator::{generate_script, ScriptOptions};
pub use naming::{button_var, camel_case, pascal_case, unique_pascal_names};
