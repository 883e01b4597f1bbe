//! Error handling for Wordmap
//!
//! Every generation failure carries a human-readable message plus the
//! originating cause (clip label and underlying decoder error where known).

use std::fmt;

use thiserror::Error;

/// Result type alias for Wordmap operations
pub type Result<T> = std::result::Result<T, WordmapError>;

/// Why a label was refused at add-time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRejection {
    /// No audio bytes, or an empty label
    EmptyInput,
    /// Label does not match `^[A-Z_][A-Z0-9_]*$` after uppercasing
    InvalidLabelFormat,
    /// Another queued clip already uses this label
    DuplicateLabel,
}

impl fmt::Display for LabelRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelRejection::EmptyInput => write!(f, "audio and label are both required"),
            LabelRejection::InvalidLabelFormat => write!(
                f,
                "labels must start with a letter or underscore and contain only A-Z, 0-9 and _"
            ),
            LabelRejection::DuplicateLabel => write!(f, "label is already in the queue"),
        }
    }
}

/// Main error type for Wordmap operations
#[derive(Error, Debug)]
pub enum WordmapError {
    // Queue Errors
    #[error("Invalid label '{label}': {reason}")]
    InvalidLabel {
        label: String,
        reason: LabelRejection,
    },

    // Decode Errors
    #[error("Error decoding '{label}'{}: {reason}", source_name(.name))]
    Decode {
        label: String,
        /// Display name of the clip's source (usually the file name)
        name: Option<String>,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Composition Errors
    #[error("Nothing to compose: {reason}")]
    EmptyComposition { reason: String },

    #[error("Clip '{label}' is {source_rate}Hz but output is {target_rate}Hz and resampling is disabled")]
    UnsupportedSampleRate {
        label: String,
        source_rate: u32,
        target_rate: u32,
    },

    // Playback Errors
    #[error("Label '{label}' not found in the segment index")]
    LabelNotFound { label: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Encode Errors
    #[error("WAV encoding failed: {reason}")]
    Encode {
        reason: String,
        #[source]
        source: Option<hound::Error>,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn source_name(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" ({})", name),
        None => String::new(),
    }
}

impl WordmapError {
    /// Create a decode error for the given clip label
    pub fn decode(label: impl Into<String>, reason: impl Into<String>) -> Self {
        WordmapError::Decode {
            label: label.into(),
            name: None,
            reason: reason.into(),
            source: None,
        }
    }

    /// Attach the clip label to a decode error produced before the label was known
    pub fn with_label(self, label: &str) -> Self {
        match self {
            WordmapError::Decode {
                name, reason, source, ..
            } => WordmapError::Decode {
                label: label.to_string(),
                name,
                reason,
                source,
            },
            other => other,
        }
    }

    /// Attach the clip's display name to a decode error
    pub fn with_source_name(self, source_name: Option<&str>) -> Self {
        match self {
            WordmapError::Decode {
                label,
                name,
                reason,
                source,
            } => WordmapError::Decode {
                label,
                name: source_name.map(str::to_string).or(name),
                reason,
                source,
            },
            other => other,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            WordmapError::InvalidLabel { .. } => "INVALID_LABEL",
            WordmapError::Decode { .. } => "DECODE_ERROR",
            WordmapError::EmptyComposition { .. } => "EMPTY_COMPOSITION",
            WordmapError::UnsupportedSampleRate { .. } => "UNSUPPORTED_SAMPLE_RATE",
            WordmapError::LabelNotFound { .. } => "LABEL_NOT_FOUND",
            WordmapError::InvalidConfig { .. } => "INVALID_CONFIG",
            WordmapError::Encode { .. } => "ENCODE_ERROR",
            WordmapError::Io(_) => "IO_ERROR",
            WordmapError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the caller's state intact and can be fixed by
    /// retrying with different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WordmapError::InvalidLabel { .. }
                | WordmapError::Decode { .. }
                | WordmapError::LabelNotFound { .. }
                | WordmapError::UnsupportedSampleRate { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            WordmapError::InvalidLabel { reason, .. } => match reason {
                LabelRejection::EmptyInput => vec!["Select an audio file and enter a label"],
                LabelRejection::InvalidLabelFormat => vec![
                    "Use letters, digits and underscores only",
                    "Start the label with a letter or underscore",
                ],
                LabelRejection::DuplicateLabel => vec![
                    "Pick a different label",
                    "Remove the existing clip first",
                ],
            },
            WordmapError::Decode { .. } => vec![
                "Check if the file plays in another application",
                "Try converting the file to WAV format first",
                "Remove the clip and add it again from the original source",
            ],
            WordmapError::EmptyComposition { .. } => vec![
                "Add at least one clip to the queue",
                "Check that the queued clips are not empty",
            ],
            WordmapError::UnsupportedSampleRate { .. } => vec![
                "Enable linear resampling in the composition settings",
                "Re-export the clip at the output sample rate",
            ],
            WordmapError::LabelNotFound { .. } => {
                vec!["Use one of the labels listed in the word map"]
            }
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = WordmapError::LabelNotFound {
            label: "JUMP".to_string(),
        };
        assert_eq!(err.error_code(), "LABEL_NOT_FOUND");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_error_message_names_clip() {
        let err = WordmapError::decode("PLACEHOLDER", "truncated header").with_label("JUMP_1");
        assert_eq!(err.to_string(), "Error decoding 'JUMP_1': truncated header");
        assert!(!err.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_decode_error_message_names_source_file() {
        let err = WordmapError::decode("PLACEHOLDER", "not a WAV file")
            .with_label("TWO")
            .with_source_name(Some("two.mp3"));
        assert_eq!(err.to_string(), "Error decoding 'TWO' (two.mp3): not a WAV file");

        let err = WordmapError::decode("ONE", "truncated").with_source_name(None);
        assert_eq!(err.to_string(), "Error decoding 'ONE': truncated");
    }

    #[test]
    fn test_with_label_leaves_other_errors_alone() {
        let err = WordmapError::EmptyComposition {
            reason: "no clips".to_string(),
        }
        .with_label("A");
        assert_eq!(err.error_code(), "EMPTY_COMPOSITION");
    }

    #[test]
    fn test_invalid_label_display() {
        let err = WordmapError::InvalidLabel {
            label: "1ABC".to_string(),
            reason: LabelRejection::InvalidLabelFormat,
        };
        assert!(err.to_string().starts_with("Invalid label '1ABC'"));
        assert_eq!(err.recovery_suggestions().len(), 2);
    }
}
