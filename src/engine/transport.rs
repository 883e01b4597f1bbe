//! Segment Playback State Machine for Wordmap
//!
//! Plays one labelled sub-range of the combined track on a shared playback
//! handle and halts it at the segment's end time. The handle only offers
//! "start at offset", "pause/stop" and a coarse position query, so the end is
//! enforced by two cancellable watchers:
//!
//! - a recurring **poll** that stops playback as soon as the reported position
//!   is at or past the end time;
//! - a one-shot **fallback** armed for the segment length plus an overrun
//!   buffer, in case polling stalls.
//!
//! Both watchers funnel into the same stop sequence, guarded by the
//! `Stopping` state: only one stop sequence can run per handle, and new play
//! requests are ignored until a short guard delay has passed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::scheduler::{Scheduler, TaskId};
use crate::error::{Result, WordmapError};
use crate::timeline::{Segment, SegmentIndex};

// ============================================================================
// Timing
// ============================================================================

/// Timing constants of the boundary-stop protocol, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryTiming {
    /// Cadence of the position poll
    pub poll_interval: f64,
    /// Time spent in `Stopping` before new requests are accepted
    pub guard_delay: f64,
    /// Extra time past the segment length before the fallback fires
    pub overrun_buffer: f64,
    /// Overrun past the end time still treated as normal lag by the fallback
    pub overrun_tolerance: f64,
}

impl Default for BoundaryTiming {
    fn default() -> Self {
        Self::for_poll_interval(1.0 / 60.0)
    }
}

impl BoundaryTiming {
    /// Derive the protocol constants from the host's polling cadence
    ///
    /// At a 60Hz poll this yields a 50ms guard, a 200ms fallback buffer and a
    /// 180ms tolerance.
    pub fn for_poll_interval(poll_interval: f64) -> Self {
        let guard_delay = poll_interval.max(0.05);
        let overrun_buffer = (3.0 * poll_interval).max(0.2);
        let overrun_tolerance = overrun_buffer - poll_interval.max(0.02);
        Self {
            poll_interval,
            guard_delay,
            overrun_buffer,
            overrun_tolerance,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("poll_interval", self.poll_interval),
            ("guard_delay", self.guard_delay),
            ("overrun_buffer", self.overrun_buffer),
            ("overrun_tolerance", self.overrun_tolerance),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(WordmapError::InvalidConfig {
                    reason: format!("{} must be a positive number of seconds, got {}", name, value),
                });
            }
        }
        if self.overrun_tolerance >= self.overrun_buffer {
            return Err(WordmapError::InvalidConfig {
                reason: format!(
                    "overrun_tolerance ({}) must be smaller than overrun_buffer ({})",
                    self.overrun_tolerance, self.overrun_buffer
                ),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Playback handle
// ============================================================================

/// The host playback primitives the protocol is built on
pub trait PlaybackHandle {
    /// Seek to `position` seconds and start playing
    fn play_from(&mut self, position: f64);
    /// Pause at the current position, without seeking
    fn pause(&mut self);
    /// Stop playback unconditionally
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
    /// Last reported position in seconds; may lag the true position
    fn position(&self) -> f64;
}

/// Calls recorded by [`SimulatedPlayback`]
#[derive(Debug, Clone, PartialEq)]
pub enum HandleCall {
    PlayFrom(f64),
    Pause { at: f64 },
    Stop,
}

/// In-memory playback handle whose position moves only when told to
///
/// Stands in for a host playback engine in tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlayback {
    playing: bool,
    position: f64,
    /// Track length; playback ends on its own when reached
    length: Option<f64>,
    calls: Vec<HandleCall>,
}

impl SimulatedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle over a track of `length` seconds
    pub fn with_length(length: f64) -> Self {
        Self {
            length: Some(length),
            ..Self::default()
        }
    }

    /// Move the playhead forward by `elapsed` seconds if playing
    pub fn advance(&mut self, elapsed: f64) {
        if !self.playing {
            return;
        }
        self.position += elapsed;
        if let Some(length) = self.length {
            if self.position >= length {
                self.position = length;
                self.playing = false;
            }
        }
    }

    /// Force the reported position, as a host would on a coarse update
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    /// Make playback end without the controller asking for it
    pub fn end_externally(&mut self) {
        self.playing = false;
    }

    pub fn calls(&self) -> &[HandleCall] {
        &self.calls
    }
}

impl PlaybackHandle for SimulatedPlayback {
    fn play_from(&mut self, position: f64) {
        self.position = position;
        self.playing = true;
        self.calls.push(HandleCall::PlayFrom(position));
    }

    fn pause(&mut self) {
        self.playing = false;
        self.calls.push(HandleCall::Pause { at: self.position });
    }

    fn stop(&mut self) {
        self.playing = false;
        self.calls.push(HandleCall::Stop);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> f64 {
        self.position
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Controller states
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    /// Nothing playing; requests accepted (initial and resting state)
    #[default]
    Idle,
    /// Playing the contained segment, watchers armed
    Playing(Segment),
    /// Stop sequence in progress; requests ignored until the guard fires
    Stopping,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Playing(segment) => write!(f, "Playing({})", segment.label),
            PlaybackState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Result of a play request that found its label
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// Playback started from the segment's start time
    Started(Segment),
    /// A stop sequence was in progress; nothing changed
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Watcher {
    Poll,
    Fallback,
    Guard,
}

/// Why a stop sequence began
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopCause {
    Boundary,
    Fallback,
}

/// Plays index segments on one handle with boundary-accurate stopping
///
/// # Example
/// ```
/// use wordmap::engine::{
///     BoundaryController, BoundaryTiming, PlaybackHandle, PlaybackState, SimulatedPlayback,
/// };
/// use wordmap::timeline::{Segment, SegmentIndex};
///
/// let mut index = SegmentIndex::new();
/// index.push(Segment::new("HELLO", 2.5, 5.5)).unwrap();
///
/// let mut player = BoundaryController::new(SimulatedPlayback::new(), index, BoundaryTiming::default());
/// player.play_segment("HELLO").unwrap();
/// assert_eq!(player.handle().position(), 2.5);
///
/// // First poll lands at ~16.7ms and sees the playhead past the end
/// player.handle_mut().set_position(5.51);
/// player.advance_to(0.02);
/// assert_eq!(player.state(), &PlaybackState::Stopping);
///
/// player.advance_to(0.1);
/// assert_eq!(player.state(), &PlaybackState::Idle);
/// ```
#[derive(Debug)]
pub struct BoundaryController<H: PlaybackHandle> {
    handle: H,
    index: SegmentIndex,
    timing: BoundaryTiming,
    state: PlaybackState,
    scheduler: Scheduler<Watcher>,
    poll: Option<TaskId>,
    fallback: Option<TaskId>,
    guard: Option<TaskId>,
    stop_count: usize,
}

impl<H: PlaybackHandle> BoundaryController<H> {
    pub fn new(handle: H, index: SegmentIndex, timing: BoundaryTiming) -> Self {
        Self {
            handle,
            index,
            timing,
            state: PlaybackState::Idle,
            scheduler: Scheduler::new(),
            poll: None,
            fallback: None,
            guard: None,
            stop_count: 0,
        }
    }

    /// Start playing the segment for `label`
    ///
    /// Cancels any watchers of the previous segment, stops the handle, seeks
    /// to the segment start, plays, and arms a fresh poll and fallback.
    ///
    /// # Errors
    /// * `LabelNotFound` - If the label is not in the index. The handle and
    ///   state are left untouched.
    pub fn play_segment(&mut self, label: &str) -> Result<PlayOutcome> {
        let Some(segment) = self.index.get(label).cloned() else {
            warn!("[BOUNDARY] Label '{}' not found in index", label);
            return Err(WordmapError::LabelNotFound {
                label: label.to_string(),
            });
        };

        if self.state == PlaybackState::Stopping {
            debug!("[BOUNDARY] Ignoring '{}' while stopping", label);
            return Ok(PlayOutcome::Ignored);
        }

        self.cancel_watchers();
        self.handle.stop();

        debug!(
            "[BOUNDARY] Playing '{}': {:.3}s to {:.3}s",
            segment.label, segment.start_time, segment.end_time
        );
        self.handle.play_from(segment.start_time);
        self.state = PlaybackState::Playing(segment.clone());

        self.poll = Some(
            self.scheduler
                .schedule_every(self.timing.poll_interval, Watcher::Poll),
        );
        self.fallback = Some(self.scheduler.schedule_once(
            segment.duration() + self.timing.overrun_buffer,
            Watcher::Fallback,
        ));

        Ok(PlayOutcome::Started(segment))
    }

    /// Advance the controller clock to `now`, firing every due watcher
    pub fn advance_to(&mut self, now: f64) {
        while let Some((id, watcher)) = self.scheduler.next_due(now) {
            match watcher {
                Watcher::Poll => self.on_poll(),
                Watcher::Fallback => self.on_fallback(id),
                Watcher::Guard => self.on_guard(id),
            }
        }
    }

    fn on_poll(&mut self) {
        let end_time = match &self.state {
            PlaybackState::Playing(segment) => segment.end_time,
            _ => {
                self.cancel_watchers();
                return;
            }
        };

        if !self.handle.is_playing() {
            debug!("[BOUNDARY] Playback ended on its own");
            self.cancel_watchers();
            self.state = PlaybackState::Idle;
            return;
        }

        if self.handle.position() >= end_time {
            self.begin_stop(StopCause::Boundary);
        }
    }

    fn on_fallback(&mut self, id: TaskId) {
        if self.fallback == Some(id) {
            self.fallback = None;
        }

        let end_time = match &self.state {
            PlaybackState::Playing(segment) => segment.end_time,
            _ => return,
        };

        if !self.handle.is_playing() {
            self.cancel_watchers();
            self.state = PlaybackState::Idle;
            return;
        }

        // Only a lagging position within the tolerance is forced to stop
        let position = self.handle.position();
        if position >= end_time + self.timing.overrun_tolerance {
            warn!(
                "[BOUNDARY] Position {:.3}s overran end {:.3}s by more than {:.3}s; fallback not stopping",
                position, end_time, self.timing.overrun_tolerance
            );
            return;
        }
        self.begin_stop(StopCause::Fallback);
    }

    fn on_guard(&mut self, id: TaskId) {
        if self.guard != Some(id) {
            return;
        }
        self.guard = None;
        if self.state == PlaybackState::Stopping {
            self.state = PlaybackState::Idle;
            debug!("[BOUNDARY] Ready for next segment");
        }
    }

    /// The single stop sequence shared by both watchers
    fn begin_stop(&mut self, cause: StopCause) {
        let end_time = match &self.state {
            PlaybackState::Playing(segment) => segment.end_time,
            _ => return,
        };

        self.state = PlaybackState::Stopping;
        self.handle.pause();
        self.cancel_watchers();
        self.guard = Some(
            self.scheduler
                .schedule_once(self.timing.guard_delay, Watcher::Guard),
        );
        self.stop_count += 1;

        debug!(
            "[BOUNDARY] Paused at {:.3}s (target {:.3}s, {:?})",
            self.handle.position(),
            end_time,
            cause
        );
    }

    fn cancel_watchers(&mut self) {
        if let Some(id) = self.poll.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.fallback.take() {
            self.scheduler.cancel(id);
        }
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    /// Current controller clock in seconds
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// Watchers and guards still armed
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Number of stop sequences run so far
    pub fn stop_count(&self) -> usize {
        self.stop_count
    }

    pub fn timing(&self) -> &BoundaryTiming {
        &self.timing
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
