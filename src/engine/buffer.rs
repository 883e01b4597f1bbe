//! PCM Buffer Management
//!
//! Provides the decoded audio type shared by the decoder, the compositor and
//! the WAV encoder. Samples are stored non-interleaved as 32-bit floats.

use crate::engine::io::UNLABELLED;
use crate::error::{Result, WordmapError};

// ============================================================================
// Constants
// ============================================================================

/// Default output sample rate for compositions (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Maximum supported channel count for compositions
pub const MAX_CHANNELS: usize = 2;

// ============================================================================
// PCM Buffer
// ============================================================================

/// Decoded audio: per-channel sample sequences at a fixed sample rate
///
/// Amplitudes are nominally in [-1.0, 1.0]. Every channel holds the same
/// number of frames.
///
/// # Example
/// ```
/// use wordmap::engine::PcmBuffer;
///
/// // 1 second of stereo silence at 48kHz
/// let buffer = PcmBuffer::silence(2, 48000, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.frames(), 48000);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Sample data: outer Vec is channels, inner Vec is frames
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl PcmBuffer {
    /// Create a silent buffer with the given channel count, length and rate
    pub fn silence(channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; frames]; channels],
            sample_rate,
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// Fails if the channels have different lengths.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if let Some(first) = samples.first() {
            let frames = first.len();
            if let Some(bad) = samples.iter().position(|ch| ch.len() != frames) {
                return Err(WordmapError::InvalidConfig {
                    reason: format!(
                        "channel {} has {} frames, expected {}",
                        bad,
                        samples[bad].len(),
                        frames
                    ),
                });
            }
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved samples (L, R, L, R, ... for stereo)
    /// * `channels` - Number of interleaved channels
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(WordmapError::InvalidConfig {
                reason: "channel count must be positive".to_string(),
            });
        }

        if interleaved.len() % channels != 0 {
            return Err(WordmapError::InvalidConfig {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channels
                ),
            });
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];

        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let channels = self.channels();
        let frames = self.frames();

        if channels == 0 || frames == 0 {
            return Vec::new();
        }

        let mut interleaved = Vec::with_capacity(channels * frames);
        for frame in 0..frames {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Check if the buffer holds no audio
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Get the duration in seconds at the buffer's own sample rate
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .all(|s| s.is_finite())
    }

    /// Peak absolute amplitude across all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Check that a decoded buffer can be placed on a timeline
    ///
    /// Fails with a `Decode` error when the buffer has no channels, a zero
    /// sample rate, no frames, or channels of different lengths.
    pub fn validate_decoded(&self) -> Result<()> {
        let reason = if self.channels() == 0 {
            Some("decoded audio has no channels".to_string())
        } else if self.sample_rate == 0 {
            Some("decoded audio has a sample rate of 0Hz".to_string())
        } else if self.frames() == 0 {
            Some("Audio contains no samples".to_string())
        } else if self.samples.iter().any(|ch| ch.len() != self.frames()) {
            Some("decoded channels have different lengths".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(WordmapError::decode(UNLABELLED, reason)),
            None => Ok(()),
        }
    }

    /// Replace non-finite samples with silence and clamp to [-1.0, 1.0]
    pub fn sanitize(&mut self) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample = sanitize_sample(*sample);
            }
        }
    }
}

impl Default for PcmBuffer {
    fn default() -> Self {
        Self::silence(MAX_CHANNELS, 0, DEFAULT_SAMPLE_RATE)
    }
}

/// Map a sample into [-1.0, 1.0], treating NaN/Inf as silence
#[inline]
pub fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================
