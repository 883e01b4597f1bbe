//! Generation session
//!
//! The embeddable entry point: queue labelled clips, then generate the
//! combined WAV, the word map and the playback script in one call.
//!
//! ```
//! use wordmap::engine::{encode_wav, generate_test_tone};
//! use wordmap::{Session, WordmapConfig};
//!
//! let mut session = Session::new(WordmapConfig::mono_44k());
//! let a = encode_wav(&generate_test_tone(440.0, 2.0, 44_100, 1)).unwrap();
//! let b = encode_wav(&generate_test_tone(660.0, 3.0, 44_100, 1)).unwrap();
//! session.add_clip(a, "a").unwrap();
//! session.add_clip(b, "b").unwrap();
//!
//! let artifacts = session.generate().unwrap();
//! assert_eq!(artifacts.total_duration, 5.5);
//! assert_eq!(artifacts.index.get("B").unwrap().start_time, 2.5);
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::WordmapConfig;
use crate::engine::{encode_wav, AudioDecoder, PcmBuffer, WavDecoder};
use crate::error::{Result, WordmapError};
use crate::script::generate_script;
use crate::timeline::{compose, Clip, ClipId, ClipRegistry, SegmentIndex};

/// File name of the standalone word map written by [`GeneratedArtifacts::write_to_dir`]
pub const WORD_MAP_FILE_NAME: &str = "word_map.lua";
/// File name of the playback script written by [`GeneratedArtifacts::write_to_dir`]
pub const SCRIPT_FILE_NAME: &str = "sound_script.lua";

/// Everything one `generate()` call produces
#[derive(Debug, Clone)]
pub struct GeneratedArtifacts {
    /// Complete 16-bit PCM WAV file
    pub audio: Vec<u8>,
    pub index: SegmentIndex,
    /// Word map as a Luau table literal
    pub index_text: String,
    /// Playback-controller LocalScript source
    pub script_text: String,
    /// Rendered duration in seconds
    pub total_duration: f64,
}

impl GeneratedArtifacts {
    /// Hex SHA-256 of the WAV bytes
    pub fn audio_sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.audio);
        format!("{:x}", hasher.finalize())
    }

    /// `combined_audio_<timestamp>.wav`, with `:` and `.` in the timestamp
    /// replaced by `-`
    pub fn suggested_file_name(at: DateTime<Utc>) -> String {
        let stamp = at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        format!("combined_audio_{}.wav", stamp)
    }

    /// Write the WAV, the word map and the script into `dir`
    ///
    /// Returns the written paths in that order.
    pub fn write_to_dir(&self, dir: &Path, at: DateTime<Utc>) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let files = [
            (Self::suggested_file_name(at), self.audio.as_slice()),
            (WORD_MAP_FILE_NAME.to_string(), self.index_text.as_bytes()),
            (SCRIPT_FILE_NAME.to_string(), self.script_text.as_bytes()),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (name, contents) in files {
            let path = dir.join(name);
            fs::write(&path, contents)?;
            debug!("Wrote {} ({} bytes)", path.display(), contents.len());
            written.push(path);
        }
        Ok(written)
    }
}

/// Clip queue plus decoded-buffer cache
pub struct Session {
    config: WordmapConfig,
    registry: ClipRegistry,
    decoder: Box<dyn AudioDecoder>,
    cache: HashMap<ClipId, Arc<PcmBuffer>>,
}

impl Session {
    /// Create a session that decodes WAV input
    pub fn new(config: WordmapConfig) -> Self {
        Self::with_decoder(config, WavDecoder)
    }

    /// Create a session with a custom decoder
    pub fn with_decoder(config: WordmapConfig, decoder: impl AudioDecoder + 'static) -> Self {
        Self {
            config,
            registry: ClipRegistry::new(),
            decoder: Box::new(decoder),
            cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WordmapConfig {
        &self.config
    }

    /// Queue a clip; see [`ClipRegistry::add`]
    pub fn add_clip(&mut self, source: impl Into<Arc<[u8]>>, label: &str) -> Result<ClipId> {
        self.registry.add(source, label)
    }

    /// Queue a clip with a display name (usually the original file name)
    pub fn add_named_clip(
        &mut self,
        source: impl Into<Arc<[u8]>>,
        label: &str,
        name: impl Into<String>,
    ) -> Result<ClipId> {
        self.registry.add_named(source, label, name)
    }

    /// Remove a clip and its cached decode
    pub fn remove_clip(&mut self, id: ClipId) -> Option<Clip> {
        self.cache.remove(&id);
        self.registry.remove(id)
    }

    /// Queued clips in order
    pub fn clips(&self) -> &[Clip] {
        self.registry.list()
    }

    /// Number of clips with a cached decode
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Decode, compose, encode and generate the script for the current queue
    ///
    /// # Errors
    /// * `InvalidConfig` - If the config does not validate
    /// * `EmptyComposition` - If nothing is queued or every clip is empty
    /// * `Decode` - The first clip, in queue order, that failed to decode
    /// * `UnsupportedSampleRate` - If resampling is disabled and a rate differs
    ///
    /// On error the queue is untouched and no new decodes are cached.
    pub fn generate(&mut self) -> Result<GeneratedArtifacts> {
        self.config.validate()?;

        if self.registry.is_empty() {
            return Err(WordmapError::EmptyComposition {
                reason: "no clips queued".to_string(),
            });
        }

        self.decode_pending()?;

        let buffers: Vec<(&str, Arc<PcmBuffer>)> = self
            .registry
            .iter()
            .map(|clip| {
                self.cache
                    .get(&clip.id())
                    .map(|buffer| (clip.label(), Arc::clone(buffer)))
                    .ok_or_else(|| WordmapError::decode(clip.label(), "decoded buffer missing"))
            })
            .collect::<Result<_>>()?;
        let clips: Vec<(&str, &PcmBuffer)> = buffers
            .iter()
            .map(|(label, buffer)| (*label, buffer.as_ref()))
            .collect();

        let composition = compose(&clips, &self.config.composition)?;
        let audio = encode_wav(&composition.buffer)?;
        let index_text = composition.index.to_word_map_text();
        let script_text = generate_script(&composition.index, &self.config.script);

        info!(
            "Generated {} segments, {:.3}s, {} WAV bytes",
            composition.index.len(),
            composition.total_duration,
            audio.len()
        );

        Ok(GeneratedArtifacts {
            audio,
            index: composition.index,
            index_text,
            script_text,
            total_duration: composition.total_duration,
        })
    }

    /// Decode every queued clip not yet in the cache
    ///
    /// Decodes run in parallel and may finish in any order; results are
    /// matched back to queue positions and committed only if all succeed.
    fn decode_pending(&mut self) -> Result<()> {
        let pending: Vec<(usize, &Clip)> = self
            .registry
            .iter()
            .enumerate()
            .filter(|(_, clip)| !self.cache.contains_key(&clip.id()))
            .collect();

        if pending.is_empty() {
            return Ok(());
        }
        debug!("Decoding {} of {} clips", pending.len(), self.registry.len());

        let decoder = self.decoder.as_ref();
        let results: Vec<(usize, ClipId, Result<PcmBuffer>)> = pending
            .par_iter()
            .map(|(position, clip)| {
                let decoded = decoder
                    .decode(clip.source())
                    .and_then(|buffer| buffer.validate_decoded().map(|()| buffer))
                    .map_err(|e| e.with_label(clip.label()).with_source_name(clip.name()));
                (*position, clip.id(), decoded)
            })
            .collect();

        let mut decoded = Vec::with_capacity(results.len());
        for (position, id, result) in results {
            match result {
                Ok(buffer) => {
                    debug!(
                        "Decoded clip #{}: {} frames, {}ch @ {}Hz",
                        position,
                        buffer.frames(),
                        buffer.channels(),
                        buffer.sample_rate
                    );
                    decoded.push((id, Arc::new(buffer)));
                }
                Err(e) => return Err(e),
            }
        }

        self.cache.extend(decoded);
        Ok(())
    }
}
