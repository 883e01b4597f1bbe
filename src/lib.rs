//! Wordmap - Labelled Audio Clip Concatenator
//!
//! Wordmap joins a queue of short, labelled audio clips into one track and
//! produces everything needed to play any single clip back out of it:
//! 1. The combined track as a 16-bit PCM WAV file
//! 2. A word map: label -> `[start, end)` in seconds, as a Luau table
//! 3. A Luau playback script that plays one segment and stops at its end
//!
//! # Architecture
//!
//! - `timeline`: clip registry, compositor and segment index
//! - `engine`: PCM buffers, WAV I/O, resampling and the boundary-stop
//!   playback controller
//! - `script`: playback-script generation
//! - `session`: the queue-and-generate entry point

pub mod config;
pub mod engine;
pub mod error;
pub mod script;
pub mod session;
pub mod timeline;

pub use config::WordmapConfig;
pub use error::{LabelRejection, Result, WordmapError};
pub use session::{GeneratedArtifacts, Session};
