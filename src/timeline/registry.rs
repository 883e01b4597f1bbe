//! Clip Registry
//!
//! Holds the ordered queue of clips waiting to be composed. Queue order is
//! playback order. The registry never touches audio; decoding happens at
//! generation time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{LabelRejection, Result, WordmapError};

/// Opaque handle identifying a queued clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(Uuid);

impl ClipId {
    fn new() -> Self {
        ClipId(Uuid::new_v4())
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queued audio clip
#[derive(Debug, Clone)]
pub struct Clip {
    id: ClipId,
    label: String,
    name: Option<String>,
    source: Arc<[u8]>,
}

impl Clip {
    pub fn id(&self) -> ClipId {
        self.id
    }

    /// Normalized (uppercase) label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Display name supplied at add-time, usually the original file name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The raw, undecoded audio bytes
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// How this clip is named in logs and error messages
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", self.label, name),
            None => self.label.clone(),
        }
    }
}

/// Normalize and validate a label
///
/// Trims surrounding whitespace and uppercases, then requires
/// `^[A-Z_][A-Z0-9_]*$`.
///
/// # Example
/// ```
/// use wordmap::timeline::validate_label;
///
/// assert_eq!(validate_label(" jump_1 ").unwrap(), "JUMP_1");
/// assert!(validate_label("1ABC").is_err());
/// ```
pub fn validate_label(raw: &str) -> std::result::Result<String, LabelRejection> {
    let label = raw.trim().to_uppercase();

    let mut chars = label.chars();
    let first = chars.next().ok_or(LabelRejection::EmptyInput)?;

    let head_ok = first.is_ascii_uppercase() || first == '_';
    let tail_ok = chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');

    if head_ok && tail_ok {
        Ok(label)
    } else {
        Err(LabelRejection::InvalidLabelFormat)
    }
}

/// Ordered queue of clips with unique labels
#[derive(Debug, Clone, Default)]
pub struct ClipRegistry {
    clips: Vec<Clip>,
}

impl ClipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a clip under `label`
    ///
    /// # Errors
    /// * `InvalidLabel` with `EmptyInput` - no bytes or a blank label
    /// * `InvalidLabel` with `InvalidLabelFormat` - label fails the pattern
    /// * `InvalidLabel` with `DuplicateLabel` - label already queued
    pub fn add(&mut self, source: impl Into<Arc<[u8]>>, label: &str) -> Result<ClipId> {
        self.insert(source.into(), label, None)
    }

    /// Queue a clip with a display name for logs and errors
    pub fn add_named(
        &mut self,
        source: impl Into<Arc<[u8]>>,
        label: &str,
        name: impl Into<String>,
    ) -> Result<ClipId> {
        self.insert(source.into(), label, Some(name.into()))
    }

    fn insert(&mut self, source: Arc<[u8]>, label: &str, name: Option<String>) -> Result<ClipId> {
        let reject = |reason| WordmapError::InvalidLabel {
            label: label.trim().to_string(),
            reason,
        };

        if source.is_empty() {
            return Err(reject(LabelRejection::EmptyInput));
        }
        let label = validate_label(label).map_err(reject)?;
        if self.contains_label(&label) {
            return Err(WordmapError::InvalidLabel {
                label,
                reason: LabelRejection::DuplicateLabel,
            });
        }

        let clip = Clip {
            id: ClipId::new(),
            label,
            name,
            source,
        };
        let id = clip.id;
        debug!("Queued clip {} as {}", clip.describe(), id);
        self.clips.push(clip);
        Ok(id)
    }

    /// Remove a clip; unknown ids are ignored
    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let pos = self.clips.iter().position(|c| c.id == id)?;
        let clip = self.clips.remove(pos);
        debug!("Removed clip {}", clip.describe());
        Some(clip)
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.clips.iter().any(|c| c.label == label)
    }

    /// Clips in queue order
    pub fn list(&self) -> &[Clip] {
        &self.clips
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
