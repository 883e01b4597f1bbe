//! Wordmap configuration
//!
//! Everything a [`Session`](crate::session::Session) needs besides the clips:
//! output format and spacing, plus the knobs of the generated script.
//! Stored as JSON; missing fields fall back to their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::BoundaryTiming;
use crate::error::{Result, WordmapError};
use crate::script::ScriptOptions;
use crate::timeline::CompositionSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordmapConfig {
    pub composition: CompositionSettings,
    pub script: ScriptOptions,
}

impl WordmapConfig {
    /// 48kHz stereo with a 0.5s gap
    pub fn stereo_48k() -> Self {
        Self::default()
    }

    /// 44.1kHz mono with a 0.5s gap
    pub fn mono_44k() -> Self {
        Self {
            composition: CompositionSettings {
                sample_rate: 44_100,
                channels: 1,
                ..CompositionSettings::default()
            },
            ..Self::default()
        }
    }

    /// Replace the script timing with constants derived from a poll cadence
    pub fn with_poll_interval(mut self, poll_interval: f64) -> Self {
        self.script.timing = BoundaryTiming::for_poll_interval(poll_interval);
        self
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WordmapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.composition.validate()?;
        self.script.validate()?;

        if self.script.sound_name.trim().is_empty() {
            return Err(WordmapError::InvalidConfig {
                reason: "script sound_name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResampleMode;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_presets() {
        let stereo = WordmapConfig::stereo_48k();
        assert_eq!(stereo.composition.sample_rate, 48_000);
        assert_eq!(stereo.composition.channels, 2);

        let mono = WordmapConfig::mono_44k();
        assert_eq!(mono.composition.sample_rate, 44_100);
        assert_eq!(mono.composition.channels, 1);
        assert_eq!(mono.composition.delay_secs, 0.5);

        assert!(stereo.validate().is_ok());
        assert!(mono.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = WordmapConfig::from_json_str(
            r#"{ "composition": { "delay_secs": 0.25, "resample": "reject" } }"#,
        )
        .unwrap();

        assert_eq!(config.composition.delay_secs, 0.25);
        assert_eq!(config.composition.resample, ResampleMode::Reject);
        assert_eq!(config.composition.sample_rate, 48_000);
        assert_eq!(config.script, ScriptOptions::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = WordmapConfig::from_json_str(r#"{ "composition": { "channels": 6 } }"#)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let err = WordmapConfig::from_json_str(r#"{ "script": { "sound_name": "  " } }"#)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let err = WordmapConfig::from_json_str("not json").unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wordmap.json");

        let config = WordmapConfig::mono_44k().with_poll_interval(0.1);
        config.save(&path).unwrap();

        let loaded = WordmapConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.script.timing.guard_delay, 0.1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = WordmapConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
