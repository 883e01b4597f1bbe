//! Timeline Compositor
//!
//! Places N decoded clips on one timeline separated by a fixed silence gap,
//! renders them into a single buffer and records where each one landed.
//!
//! Placement is computed in seconds from the clips' native durations; each
//! clip starts at output frame `round(cursor * R)`. Index times are rounded to
//! milliseconds, so for consecutive clips `end_i + delay == start_j` holds to
//! within 0.001s.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::buffer::{PcmBuffer, DEFAULT_SAMPLE_RATE, MAX_CHANNELS};
use crate::engine::resample::{conform_rate, ResampleMode};
use crate::error::{Result, WordmapError};
use crate::timeline::index::{Segment, SegmentIndex};

/// Default silence between consecutive clips, in seconds
pub const DEFAULT_DELAY_SECS: f64 = 0.5;

/// Output format and spacing for a composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionSettings {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Output channel count (1 or 2)
    pub channels: usize,
    /// Silence inserted between clips, in seconds
    pub delay_secs: f64,
    /// Handling of clips at a different sample rate
    pub resample: ResampleMode,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: MAX_CHANNELS,
            delay_secs: DEFAULT_DELAY_SECS,
            resample: ResampleMode::Linear,
        }
    }
}

impl CompositionSettings {
    pub fn new(sample_rate: u32, channels: usize, delay_secs: f64) -> Self {
        Self {
            sample_rate,
            channels,
            delay_secs,
            ..Self::default()
        }
    }

    pub fn with_resample(mut self, resample: ResampleMode) -> Self {
        self.resample = resample;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(WordmapError::InvalidConfig {
                reason: "sample rate must be positive".to_string(),
            });
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(WordmapError::InvalidConfig {
                reason: format!(
                    "{} output channels requested (only mono/stereo supported)",
                    self.channels
                ),
            });
        }
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(WordmapError::InvalidConfig {
                reason: format!("delay must be a non-negative number, got {}", self.delay_secs),
            });
        }
        Ok(())
    }
}

/// Where one clip sits in the output
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Unrounded start, in seconds
    pub start_secs: f64,
    /// Native duration of the clip, in seconds
    pub duration_secs: f64,
    /// First output frame written by this clip
    pub start_frame: usize,
}

/// Placement of every clip plus the resulting index, without audio
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub placements: Vec<Placement>,
    pub index: SegmentIndex,
    /// Sum of clip durations plus the gaps between them
    pub total_duration: f64,
    /// Output length: `ceil(R * total_duration)`
    pub total_frames: usize,
}

/// A rendered composition
#[derive(Debug, Clone)]
pub struct Composition {
    pub buffer: PcmBuffer,
    pub index: SegmentIndex,
    pub total_duration: f64,
}

/// Compute placement and index for clips given as `(label, duration)` pairs
///
/// # Errors
/// * `InvalidConfig` - If the settings are out of range
/// * `EmptyComposition` - If there are no clips or the total duration is zero
pub fn plan_layout<'a, I>(clips: I, settings: &CompositionSettings) -> Result<Layout>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    settings.validate()?;
    let clips: Vec<(&str, f64)> = clips.into_iter().collect();

    if clips.is_empty() {
        return Err(WordmapError::EmptyComposition {
            reason: "no clips queued".to_string(),
        });
    }

    let rate = settings.sample_rate as f64;
    let gaps = settings.delay_secs * (clips.len() - 1) as f64;
    let total_duration: f64 = clips.iter().map(|(_, d)| d).sum::<f64>() + gaps;

    if !(total_duration > 0.0) {
        return Err(WordmapError::EmptyComposition {
            reason: format!("total duration is {:.3}s", total_duration),
        });
    }

    let mut placements = Vec::with_capacity(clips.len());
    let mut index = SegmentIndex::new();
    let mut cursor = 0.0_f64;
    let last = clips.len() - 1;

    for (i, (label, duration)) in clips.into_iter().enumerate() {
        placements.push(Placement {
            start_secs: cursor,
            duration_secs: duration,
            start_frame: (cursor * rate).round() as usize,
        });
        index.push(Segment::new(label, cursor, cursor + duration))?;

        cursor += duration;
        if i < last {
            cursor += settings.delay_secs;
        }
    }

    Ok(Layout {
        placements,
        index,
        total_duration,
        total_frames: (rate * total_duration).ceil() as usize,
    })
}

/// Render decoded clips into one buffer and build the index
///
/// Clips are mixed (summed) into a silent output in the given order. A clip
/// at a different sample rate is resampled or rejected per
/// `settings.resample`.
///
/// # Errors
/// * `InvalidConfig` - If the settings are out of range
/// * `EmptyComposition` - If there are no clips or the total duration is zero
/// * `UnsupportedSampleRate` - If a clip needs resampling and it is disabled
pub fn compose(clips: &[(&str, &PcmBuffer)], settings: &CompositionSettings) -> Result<Composition> {
    let layout = plan_layout(
        clips.iter().map(|(label, buffer)| (*label, buffer.duration_secs())),
        settings,
    )?;

    let mut output = PcmBuffer::silence(settings.channels, layout.total_frames, settings.sample_rate);

    for ((label, buffer), placement) in clips.iter().zip(&layout.placements) {
        let converted = conform_rate(label, buffer, settings.sample_rate, settings.resample)?;
        let source = converted.as_ref().unwrap_or(*buffer);

        debug!(
            "Placing '{}' at {:.3}s (frame {}, {} frames)",
            label,
            placement.start_secs,
            placement.start_frame,
            source.frames()
        );
        mix_into(&mut output, source, placement.start_frame);
    }

    info!(
        "Composed {} clips into {:.3}s ({} frames, {}ch @ {}Hz)",
        clips.len(),
        layout.total_duration,
        layout.total_frames,
        settings.channels,
        settings.sample_rate
    );

    Ok(Composition {
        buffer: output,
        index: layout.index,
        total_duration: layout.total_duration,
    })
}

/// Add `source` into `output` starting at `start_frame`
///
/// Channel policy: output channel `c` takes source channel `min(c, n - 1)`,
/// so a mono source is duplicated across every output channel and extra
/// source channels beyond the output count are ignored. Frames past the end of
/// the output are dropped.
fn mix_into(output: &mut PcmBuffer, source: &PcmBuffer, start_frame: usize) {
    let source_channels = source.channels();
    if source_channels == 0 {
        return;
    }

    for c in 0..output.channels() {
        let src = source.channel(c.min(source_channels - 1));
        let dst = output.channel_mut(c);
        if start_frame >= dst.len() {
            continue;
        }
        for (d, s) in dst[start_frame..].iter_mut().zip(src) {
            *d += *s;
        }
    }
}
