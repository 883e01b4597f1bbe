//! Playback-script generation
//!
//! Turns a [`SegmentIndex`] into a Luau LocalScript that plays single
//! segments of the uploaded combined track. The script carries the same
//! boundary-stop protocol as [`BoundaryController`]: explicit playback state,
//! a Heartbeat poll and a `task.delay` fallback, both cancellable, with the
//! `Stopping` state as the only stop guard.
//!
//! Output is a pure function of the index and options.
//!
//! [`BoundaryController`]: crate::engine::BoundaryController

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::engine::BoundaryTiming;
use crate::error::Result;
use crate::script::naming::{button_var, camel_case, unique_pascal_names};
use crate::timeline::{format_time, SegmentIndex};

/// Knobs for the generated script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// Name of the Sound child the script looks up
    pub sound_name: String,
    /// Prefix for every printed message
    pub log_tag: String,
    /// Boundary-stop constants embedded in the script
    pub timing: BoundaryTiming,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            sound_name: "Sound".to_string(),
            log_tag: "[SoundScript]".to_string(),
            timing: BoundaryTiming::default(),
        }
    }
}

impl ScriptOptions {
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()
    }
}

const PREAMBLE: &str = r#"--- Services ---
local RunService = game:GetService("RunService")
local SoundService = game:GetService("SoundService")

-- This LocalScript expects a Sound object named SOUND_NAME as its direct child.
-- Upload the generated WAV file and set that Sound's SoundId.

local SOUND_NAME = @SOUND_NAME@
local LOG_TAG = @LOG_TAG@

local soundObject = script:FindFirstChild(SOUND_NAME)

--- Initialization Check ---
if not soundObject then
	warn(LOG_TAG .. " Sound object named '" .. SOUND_NAME .. "' not found as a child of this script. Please add it and set its SoundId.")
	return
end
if not soundObject:IsA("Sound") then
	warn(LOG_TAG .. " The object named '" .. SOUND_NAME .. "' is not a Sound instance.")
	return
end
if soundObject.SoundId == "" then
	warn(LOG_TAG .. " The Sound object's SoundId is empty. Please upload the combined audio and set the SoundId.")
end

-- Preload the sound for smoother playback
if not soundObject.IsLoaded and soundObject.SoundId ~= "" then
	print(LOG_TAG .. " Sound '" .. soundObject.Name .. "' (SoundId: " .. soundObject.SoundId .. ") is not loaded. Attempting to preload...")
	local success, err = pcall(function()
		SoundService:PreloadAsync({ soundObject })
	end)
	if success then
		print(LOG_TAG .. " Sound preloaded successfully!")
	else
		warn(LOG_TAG .. " Failed to preload sound: " .. tostring(err) .. ". Playback might be delayed or fail.")
		if not soundObject.IsLoaded then
			print(LOG_TAG .. " Waiting for sound to load via .Loaded event...")
			soundObject.Loaded:Wait()
			print(LOG_TAG .. " Sound loaded via .Loaded:Wait().")
		end
	end
elseif soundObject.IsLoaded then
	print(LOG_TAG .. " Sound is already loaded.")
end
"#;

const PLAYBACK_LOGIC: &str = r#"--- Playback Logic ---
local STOP_GUARD_DELAY = @GUARD_DELAY@
local OVERRUN_BUFFER = @OVERRUN_BUFFER@
local OVERRUN_TOLERANCE = @OVERRUN_TOLERANCE@

-- state is "Idle", "Playing" or "Stopping"
local playback = {
	state = "Idle",
	label = nil,
	segment = nil,
	pollConnection = nil,
	fallbackThread = nil,
}

local function cancelWatchers()
	if playback.pollConnection then
		playback.pollConnection:Disconnect()
		playback.pollConnection = nil
	end
	if playback.fallbackThread then
		task.cancel(playback.fallbackThread)
		playback.fallbackThread = nil
	end
end

-- The only way playback is halted at a boundary; runs at most once per segment
local function beginStop(cause)
	if playback.state ~= "Playing" then
		return
	end
	playback.state = "Stopping"
	soundObject:Pause() -- keeps TimePosition where it is
	cancelWatchers()
	print(string.format("%s Paused '%s' at TimePosition: %.3fs (Target: %.3fs, %s)", LOG_TAG, playback.label, soundObject.TimePosition, playback.segment.endTime, cause))
	task.delay(STOP_GUARD_DELAY, function()
		if playback.state == "Stopping" then
			playback.state = "Idle"
		end
	end)
end

local function playSegment(wordKey)
	-- wordKey is an uppercase label from wordMap
	local segment = wordMap[wordKey]
	if not segment then
		warn(LOG_TAG .. " WordKey '" .. tostring(wordKey) .. "' not found in wordMap.")
		return false
	end

	if playback.state == "Stopping" then
		return false
	end

	cancelWatchers()
	soundObject:Stop()

	print(string.format("%s Playing '%s': %.3fs to %.3fs", LOG_TAG, wordKey, segment.startTime, segment.endTime))
	soundObject.TimePosition = segment.startTime
	soundObject:Play()
	playback.state = "Playing"
	playback.label = wordKey
	playback.segment = segment

	playback.pollConnection = RunService.Heartbeat:Connect(function()
		if playback.state ~= "Playing" then
			return
		end
		if not soundObject.IsPlaying then
			cancelWatchers()
			playback.state = "Idle"
			return
		end
		if soundObject.TimePosition >= segment.endTime then
			beginStop("boundary")
		end
	end)

	playback.fallbackThread = task.delay(segment.endTime - segment.startTime + OVERRUN_BUFFER, function()
		playback.fallbackThread = nil
		if playback.state ~= "Playing" then
			return
		end
		if not soundObject.IsPlaying then
			cancelWatchers()
			playback.state = "Idle"
			return
		end
		if soundObject.TimePosition >= segment.endTime + OVERRUN_TOLERANCE then
			warn(string.format("%s Fallback timer skipped '%s': overran end by more than tolerance. Pos: %.3fs", LOG_TAG, wordKey, soundObject.TimePosition))
			return
		end
		beginStop("fallback")
	end)

	return true
end
"#;

/// Generate the playback-controller script for `index`
///
/// The embedded word map is byte-identical to
/// [`SegmentIndex::to_word_map_text`].
pub fn generate_script(index: &SegmentIndex, options: &ScriptOptions) -> String {
    let mut script = String::new();

    script.push_str(
        &PREAMBLE
            .replace("@SOUND_NAME@", &lua_string(&options.sound_name))
            .replace("@LOG_TAG@", &lua_string(&options.log_tag)),
    );

    script.push_str("\n-- WordMap generated from the clip queue:\n");
    script.push_str(&index.to_word_map_text());
    script.push_str("\n-- End of WordMap\n\n");

    script.push_str(
        &PLAYBACK_LOGIC
            .replace("@GUARD_DELAY@", &format_time(options.timing.guard_delay))
            .replace("@OVERRUN_BUFFER@", &format_time(options.timing.overrun_buffer))
            .replace(
                "@OVERRUN_TOLERANCE@",
                &format_time(options.timing.overrun_tolerance),
            ),
    );

    script.push_str(&segment_shortcuts(index));

    script.push_str("\n--- Add your interactions here (eg. text button)\n");
    script.push_str("\nprint(LOG_TAG .. \" Initialized successfully.\")\n");
    script
}

/// One `playXxx` function per label plus a commented wiring example
fn segment_shortcuts(index: &SegmentIndex) -> String {
    let mut text = String::from("\n--- Segment Shortcuts ---\n");
    let names = unique_pascal_names(index.labels());

    for (label, name) in index.labels().zip(&names) {
        // Writing to a String cannot fail
        let _ = writeln!(
            text,
            "local function play{}()\n\treturn playSegment(\"{}\")\nend",
            name, label
        );
    }

    if let (Some(label), Some(name)) = (index.labels().next(), names.first()) {
        let _ = writeln!(text, "\n-- Example wiring:");
        let _ = writeln!(
            text,
            "-- local {} = script.Parent:FindFirstChild(\"{}\")",
            button_var(label),
            name
        );
        let _ = writeln!(
            text,
            "-- {}.MouseButton1Click:Connect(play{})",
            button_var(label),
            name
        );
        let _ = writeln!(
            text,
            "-- ({} is the camelCase form of {})",
            camel_case(label),
            label
        );
    }

    text
}

/// Quote and escape text as a Lua string literal
fn lua_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
