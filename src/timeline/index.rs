//! Segment index
//!
//! Maps every clip label to the `[start, end)` range it occupies in the
//! combined track. Times are held at millisecond precision.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{LabelRejection, Result, WordmapError};

/// Round a time in seconds to 3 decimal places
#[inline]
pub fn round3(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// A labelled `[start_time, end_time)` range of the combined track, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub label: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl Segment {
    /// Create a segment, rounding both bounds to milliseconds
    pub fn new(label: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            label: label.into(),
            start_time: round3(start_time),
            end_time: round3(end_time),
        }
    }

    /// Length of the segment in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// The complete label -> segment mapping for one composition
///
/// Iteration follows queue order; lookup is by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct SegmentIndex {
    segments: Vec<Segment>,
    positions: HashMap<String, usize>,
}

impl SegmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment; labels must be unique
    pub fn push(&mut self, segment: Segment) -> Result<()> {
        if self.positions.contains_key(&segment.label) {
            return Err(WordmapError::InvalidLabel {
                label: segment.label,
                reason: LabelRejection::DuplicateLabel,
            });
        }
        self.positions
            .insert(segment.label.clone(), self.segments.len());
        self.segments.push(segment);
        Ok(())
    }

    /// Look up the segment for a label
    pub fn get(&self, label: &str) -> Option<&Segment> {
        self.positions.get(label).map(|&i| &self.segments[i])
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in queue order
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.label.as_str())
    }

    /// End time of the last segment, or 0.0 for an empty index
    pub fn end_time(&self) -> f64 {
        self.segments.last().map_or(0.0, |s| s.end_time)
    }

    /// Serialize as a Luau table literal
    ///
    /// ```
    /// use wordmap::timeline::{Segment, SegmentIndex};
    ///
    /// let mut index = SegmentIndex::new();
    /// index.push(Segment::new("A", 0.0, 2.0)).unwrap();
    /// assert_eq!(
    ///     index.to_word_map_text(),
    ///     "local wordMap = {\n\tA = {startTime = 0.000, endTime = 2.000},\n}"
    /// );
    /// ```
    pub fn to_word_map_text(&self) -> String {
        let mut text = String::from("local wordMap = {\n");
        for segment in &self.segments {
            // Writing to a String cannot fail
            let _ = writeln!(
                text,
                "\t{} = {{startTime = {}, endTime = {}}},",
                segment.label,
                format_time(segment.start_time),
                format_time(segment.end_time)
            );
        }
        text.push('}');
        text
    }

    /// Serialize as a JSON array of segments
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.segments)?)
    }
}

impl From<Vec<Segment>> for SegmentIndex {
    /// Later duplicates of a label are dropped
    fn from(segments: Vec<Segment>) -> Self {
        let mut index = SegmentIndex::new();
        for segment in segments {
            let _ = index.push(segment);
        }
        index
    }
}

impl From<SegmentIndex> for Vec<Segment> {
    fn from(index: SegmentIndex) -> Self {
        index.segments
    }
}

/// Format a time with exactly three decimals
#[inline]
pub fn format_time(seconds: f64) -> String {
    format!("{:.3}", seconds)
}
