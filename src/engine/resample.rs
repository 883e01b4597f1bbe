//! Sample rate conversion
//!
//! Clips recorded at a different rate than the composition are converted with
//! linear interpolation, or refused outright when the caller disables it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::buffer::PcmBuffer;
use crate::error::{Result, WordmapError};

/// What to do with a clip whose native rate differs from the output rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMode {
    /// Convert with linear interpolation
    #[default]
    Linear,
    /// Fail with `UnsupportedSampleRate`
    Reject,
}

/// Bring `buffer` to `target_rate`, honouring `mode`
///
/// Returns `None` when the buffer is already at the target rate so callers can
/// keep using the original without a copy.
pub fn conform_rate(
    label: &str,
    buffer: &PcmBuffer,
    target_rate: u32,
    mode: ResampleMode,
) -> Result<Option<PcmBuffer>> {
    if buffer.sample_rate == 0 || target_rate == 0 {
        return Err(WordmapError::UnsupportedSampleRate {
            label: label.to_string(),
            source_rate: buffer.sample_rate,
            target_rate,
        });
    }
    if buffer.sample_rate == target_rate {
        return Ok(None);
    }

    match mode {
        ResampleMode::Reject => Err(WordmapError::UnsupportedSampleRate {
            label: label.to_string(),
            source_rate: buffer.sample_rate,
            target_rate,
        }),
        ResampleMode::Linear => {
            debug!(
                "Resampling '{}' from {}Hz to {}Hz ({} channels)",
                label,
                buffer.sample_rate,
                target_rate,
                buffer.channels()
            );
            Ok(Some(PcmBuffer {
                samples: resample_channels(&buffer.samples, buffer.sample_rate, target_rate),
                sample_rate: target_rate,
            }))
        }
    }
}

/// Resample audio channels to a different sample rate
fn resample_channels(channels: &[Vec<f32>], source_rate: u32, target_rate: u32) -> Vec<Vec<f32>> {
    let ratio = target_rate as f64 / source_rate as f64;

    channels
        .iter()
        .map(|channel| resample_linear(channel, ratio))
        .collect()
}

/// Linear interpolation resampling
///
/// Output length is `round(len * ratio)` so the converted clip keeps the
/// duration the compositor already reserved for it.
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}
