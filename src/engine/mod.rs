//! Audio Engine Module
//!
//! Core audio plumbing including:
//! - PCM buffer management
//! - WAV decoding/encoding and resampling
//! - Segment playback state machine and its scheduler

pub mod buffer;
pub mod io;
pub mod resample;
pub mod scheduler;
pub mod transport;

pub use buffer::{PcmBuffer, DEFAULT_SAMPLE_RATE, MAX_CHANNELS};
pub use io::{encode_wav, generate_test_tone, AudioDecoder, WavDecoder};
pub use resample::ResampleMode;
pub use scheduler::{Scheduler, TaskId};
pub use transport::{
    BoundaryController, BoundaryTiming, HandleCall, PlayOutcome, PlaybackHandle, PlaybackState,
    SimulatedPlayback,
};
