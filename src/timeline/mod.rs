//! Timeline Module
//!
//! Everything between the clip queue and the rendered track:
//! - Clip registry (queue order, label validation)
//! - Compositor (placement, rendering)
//! - Segment index (label -> time range)

pub mod compositor;
pub mod index;
pub mod registry;

pub use compositor::{
    compose, plan_layout, Composition, CompositionSettings, Layout, Placement, DEFAULT_DELAY_SECS,
};
pub use index::{format_time, round3, Segment, SegmentIndex};
pub use registry::{validate_label, Clip, ClipId, ClipRegistry};
