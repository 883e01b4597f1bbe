//! Audio container I/O for Wordmap
//!
//! Decoding turns queued clip bytes into [`PcmBuffer`]s; encoding serializes
//! a composition into a canonical 16-bit PCM WAV file. Both work entirely in
//! memory.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{sanitize_sample, PcmBuffer};
use crate::error::{Result, WordmapError};

/// Label used for decode errors until the caller attaches the clip label
pub(crate) const UNLABELLED: &str = "<unlabelled>";

/// Bytes in a canonical PCM WAV header (RIFF + fmt + data chunk headers)
pub const WAV_HEADER_LEN: usize = 44;

/// Turns raw container bytes into PCM
///
/// Implementations must be usable from several threads at once; clips are
/// decoded in parallel.
pub trait AudioDecoder: Send + Sync {
    /// Decode a complete audio file held in memory
    ///
    /// # Errors
    /// * `Decode` - If the bytes are not a recognised container, or are
    ///   truncated or corrupt
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer>;
}

/// WAV decoder backed by `hound`
///
/// Accepts 8/16/24/32-bit integer and 32-bit float WAV data with any channel
/// count.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| WordmapError::Decode {
            label: UNLABELLED.to_string(),
            name: None,
            reason: format!("Failed to open WAV data: {}", e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 || spec.sample_rate == 0 {
            return Err(WordmapError::decode(
                UNLABELLED,
                format!(
                    "WAV header declares {} channels at {}Hz",
                    spec.channels, spec.sample_rate
                ),
            ));
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        if interleaved.len() < channels {
            return Err(WordmapError::decode(UNLABELLED, "Audio contains no samples"));
        }

        // A truncated final frame is dropped rather than rejected
        let whole = interleaved.len() - interleaved.len() % channels;
        PcmBuffer::from_interleaved(&interleaved[..whole], channels, spec.sample_rate)
    }
}

/// Encode a buffer as a 16-bit signed little-endian PCM WAV file
///
/// Non-finite samples are written as silence and every sample is clamped to
/// [-1.0, 1.0] before quantization.
///
/// # Errors
/// * `Encode` - If the buffer has no channels or `hound` refuses the data
pub fn encode_wav(buffer: &PcmBuffer) -> Result<Vec<u8>> {
    if buffer.channels() == 0 || buffer.sample_rate == 0 {
        return Err(WordmapError::Encode {
            reason: format!(
                "cannot encode {} channels at {}Hz",
                buffer.channels(),
                buffer.sample_rate
            ),
            source: None,
        });
    }

    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let data_len = buffer.frames() * buffer.channels() * 2;
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + data_len));

    let mut writer = WavWriter::new(&mut cursor, spec).map_err(encode_error)?;
    for sample in buffer.to_interleaved() {
        writer
            .write_sample(quantize_i16(sample))
            .map_err(encode_error)?;
    }
    writer.finalize().map_err(encode_error)?;

    Ok(cursor.into_inner())
}

/// Convert a float sample to 16-bit PCM using the clamp policy
#[inline]
pub fn quantize_i16(sample: f32) -> i16 {
    (sanitize_sample(sample) * 32767.0).round() as i16
}

fn encode_error(e: hound::Error) -> WordmapError {
    WordmapError::Encode {
        reason: e.to_string(),
        source: Some(e),
    }
}

/// Generate a test tone (sine wave)
///
/// Every channel carries the same sine. Useful for building clips in tests
/// and demos.
///
/// # Arguments
/// * `frequency` - Frequency of the sine wave in Hz
/// * `duration_secs` - Duration of the tone in seconds
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - Number of channels
pub fn generate_test_tone(
    frequency: f32,
    duration_secs: f64,
    sample_rate: u32,
    channels: usize,
) -> PcmBuffer {
    let frames = (duration_secs * sample_rate as f64).round() as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let tone: Vec<f32> = (0..frames)
        .map(|i| 0.5 * (angular_freq * i as f32).sin())
        .collect();

    PcmBuffer {
        samples: vec![tone; channels],
        sample_rate,
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let read_error = |bits: &str, e: hound::Error| WordmapError::Decode {
        label: UNLABELLED.to_string(),
        name: None,
        reason: format!("Failed to read {} samples: {}", bits, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| read_error("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_error("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_error("16-bit", e)),
            // 24-bit stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_error("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_error("32-bit int", e)),
            _ => Err(WordmapError::decode(
                UNLABELLED,
                format!("{}-bit integer audio is not supported", bits_per_sample),
            )),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn test_generate_test_tone() {
        let buffer = generate_test_tone(440.0, 1.0, 48000, 2);
        assert_eq!(buffer.frames(), 48000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.channel(0), buffer.channel(1));
        assert!(buffer.peak() <= 0.5);
    }

    #[test]
    fn test_canonical_header_fields() {
        let buffer = generate_test_tone(440.0, 0.25, 22050, 2);
        let bytes = encode_wav(&buffer).unwrap();

        let data_bytes = (buffer.frames() * 2 * 2) as u32;
        assert_eq!(bytes.len(), WAV_HEADER_LEN + data_bytes as usize);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + data_bytes);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1, "PCM format code");
        assert_eq!(u16_at(&bytes, 22), 2);
        assert_eq!(u32_at(&bytes, 24), 22050);
        assert_eq!(u32_at(&bytes, 28), 22050 * 4, "byte rate");
        assert_eq!(u16_at(&bytes, 32), 4, "block align");
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), data_bytes);
    }

    #[test]
    fn test_encode_clamps_out_of_range_samples() {
        let buffer = PcmBuffer::from_channels(vec![vec![2.0, -3.0, f32::NAN, 0.5]], 8000).unwrap();
        let bytes = encode_wav(&buffer).unwrap();

        let pcm: Vec<i16> = bytes[WAV_HEADER_LEN..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, -32767, 0, 16384]);
    }

    #[test]
    fn test_encode_rejects_channelless_buffer() {
        let buffer = PcmBuffer::silence(0, 0, 48000);
        assert!(matches!(
            encode_wav(&buffer),
            Err(WordmapError::Encode { .. })
        ));
    }

    #[test]
    fn test_decode_encoded_mono() {
        let original = generate_test_tone(1000.0, 0.2, 44100, 1);
        let bytes = encode_wav(&original).unwrap();
        let decoded = WavDecoder.decode(&bytes).unwrap();

        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.channels(), 1);
        assert_eq!(decoded.frames(), original.frames());
        for (orig, dec) in original.channel(0).iter().zip(decoded.channel(0)) {
            assert!((orig - dec).abs() < 0.001, "Sample mismatch: {} vs {}", orig, dec);
        }
    }

    #[test]
    fn test_decode_float_wav() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for s in [0.25_f32, -0.5, 0.75] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = WavDecoder.decode(cursor.get_ref()).unwrap();
        assert_eq!(decoded.channel(0), &[0.25, -0.5, 0.75]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = WavDecoder.decode(b"definitely not a wav file").unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_decode_truncated_file_fails() {
        let bytes = encode_wav(&generate_test_tone(440.0, 0.1, 8000, 1)).unwrap();
        let err = WavDecoder.decode(&bytes[..20]).unwrap_err();
        assert!(matches!(err, WordmapError::Decode { .. }));
    }

    #[test]
    fn test_decode_empty_data_chunk_fails() {
        let bytes = encode_wav(&PcmBuffer::silence(1, 0, 8000)).unwrap();
        let err = WavDecoder.decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("no samples"));
    }
}
