//! Integration Tests
//!
//! End-to-end tests for the Wordmap pipeline: queue clips, generate the
//! combined track and scripts, then drive playback against the index.

use approx::assert_abs_diff_eq;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use test_case::test_case;

use wordmap::engine::{
    encode_wav, generate_test_tone, AudioDecoder, BoundaryController, BoundaryTiming, HandleCall,
    PlayOutcome, PlaybackHandle, PlaybackState, SimulatedPlayback, WavDecoder,
};
use wordmap::timeline::Segment;
use wordmap::{LabelRejection, Session, WordmapConfig, WordmapError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper to create an encoded sine clip
fn wav_clip(frequency: f32, duration_secs: f64, sample_rate: u32, channels: usize) -> Vec<u8> {
    encode_wav(&generate_test_tone(frequency, duration_secs, sample_rate, channels)).unwrap()
}

fn small_config() -> WordmapConfig {
    let mut config = WordmapConfig::mono_44k();
    config.composition.sample_rate = 8_000;
    config
}

// === Full Pipeline Tests ===

#[test]
fn test_two_clips_with_default_gap() {
    init_tracing();
    let mut session = Session::new(WordmapConfig::stereo_48k());
    session.add_clip(wav_clip(440.0, 2.0, 48_000, 1), "A").unwrap();
    session.add_clip(wav_clip(660.0, 3.0, 48_000, 2), "B").unwrap();

    let artifacts = session.generate().unwrap();

    assert_abs_diff_eq!(artifacts.total_duration, 5.5, epsilon = 1e-9);
    assert_eq!(
        artifacts.index.iter().cloned().collect::<Vec<_>>(),
        vec![Segment::new("A", 0.0, 2.0), Segment::new("B", 2.5, 5.5)]
    );
    assert_eq!(
        artifacts.index_text,
        "local wordMap = {\n\
         \tA = {startTime = 0.000, endTime = 2.000},\n\
         \tB = {startTime = 2.500, endTime = 5.500},\n\
         }"
    );

    let rendered = WavDecoder.decode(&artifacts.audio).unwrap();
    assert_eq!(rendered.sample_rate, 48_000);
    assert_eq!(rendered.channels(), 2);
    assert_eq!(rendered.frames(), 264_000);
    assert_eq!(artifacts.audio.len(), 44 + 264_000 * 2 * 2);

    // The gap between the clips is silent
    let gap = &rendered.channel(0)[100_000..115_000];
    assert!(gap.iter().all(|&s| s == 0.0));
}

#[test]
fn test_index_covers_every_clip_in_order() {
    let mut session = Session::new(small_config());
    let durations = [0.3, 1.25, 0.125, 0.7];
    for (i, duration) in durations.iter().enumerate() {
        session
            .add_clip(wav_clip(300.0, *duration, 8_000, 1), &format!("CLIP_{}", i))
            .unwrap();
    }

    let artifacts = session.generate().unwrap();
    let segments: Vec<_> = artifacts.index.iter().collect();
    let delay = session.config().composition.delay_secs;

    assert_eq!(segments.len(), durations.len());
    assert_eq!(segments[0].start_time, 0.0);
    for (segment, duration) in segments.iter().zip(durations) {
        assert_abs_diff_eq!(segment.duration(), duration, epsilon = 0.001);
    }
    for pair in segments.windows(2) {
        assert_abs_diff_eq!(pair[0].end_time + delay, pair[1].start_time, epsilon = 0.001);
    }
    assert_abs_diff_eq!(
        artifacts.index.end_time(),
        artifacts.total_duration,
        epsilon = 0.001
    );

    let rendered = WavDecoder.decode(&artifacts.audio).unwrap();
    assert_abs_diff_eq!(
        rendered.duration_secs(),
        artifacts.total_duration,
        epsilon = 1.0 / 8_000.0
    );
}

#[test]
fn test_regeneration_is_byte_identical() {
    let mut session = Session::new(small_config());
    session.add_clip(wav_clip(440.0, 0.5, 8_000, 1), "HELLO").unwrap();
    session.add_clip(wav_clip(220.0, 0.75, 16_000, 2), "WORLD").unwrap();

    let first = session.generate().unwrap();
    let second = session.generate().unwrap();

    assert_eq!(first.audio, second.audio);
    assert_eq!(first.audio_sha256(), second.audio_sha256());
    assert_eq!(first.index_text, second.index_text);
    assert_eq!(first.script_text, second.script_text);
}

#[test]
fn test_script_embeds_index() {
    let mut session = Session::new(small_config());
    session.add_clip(wav_clip(440.0, 0.5, 8_000, 1), "jump_1").unwrap();

    let artifacts = session.generate().unwrap();

    assert!(artifacts.script_text.contains(&artifacts.index_text));
    assert!(artifacts.script_text.contains("local function playJump1()"));
    assert!(artifacts.script_text.contains("local SOUND_NAME = \"Sound\""));
}

// === Error Handling Tests ===

#[test]
fn test_decode_failure_aborts_and_keeps_queue() {
    init_tracing();
    let mut session = Session::new(small_config());
    session.add_clip(wav_clip(440.0, 0.5, 8_000, 1), "ONE").unwrap();
    session
        .add_named_clip(b"definitely not a wav file".to_vec(), "TWO", "two.mp3")
        .unwrap();
    session.add_clip(wav_clip(440.0, 0.5, 8_000, 1), "THREE").unwrap();

    let err = session.generate().unwrap_err();
    match &err {
        WordmapError::Decode { label, .. } => assert_eq!(label, "TWO"),
        other => panic!("expected decode error, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Error decoding 'TWO' (two.mp3):"));
    assert!(err.is_recoverable());

    let labels: Vec<_> = session.clips().iter().map(|c| c.label()).collect();
    assert_eq!(labels, vec!["ONE", "TWO", "THREE"]);
    assert_eq!(session.cached_count(), 0);

    // Removing the broken clip makes the queue usable again
    let broken = session.clips()[1].id();
    session.remove_clip(broken);
    let artifacts = session.generate().unwrap();
    assert_eq!(artifacts.index.labels().collect::<Vec<_>>(), vec!["ONE", "THREE"]);
}

#[test]
fn test_rejected_sample_rate() {
    let config = WordmapConfig::from_json_str(
        r#"{ "composition": { "sample_rate": 8000, "channels": 1, "resample": "reject" } }"#,
    )
    .unwrap();
    let mut session = Session::new(config);
    session.add_clip(wav_clip(440.0, 0.5, 16_000, 1), "FAST").unwrap();

    let err = session.generate().unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_SAMPLE_RATE");
}

#[test_case("1ABC", Some(LabelRejection::InvalidLabelFormat) ; "leading digit")]
#[test_case("HAS SPACE", Some(LabelRejection::InvalidLabelFormat) ; "inner space")]
#[test_case("   ", Some(LabelRejection::EmptyInput) ; "blank")]
#[test_case(" jump_1 ", None ; "normalized")]
#[test_case("_PRIVATE", None ; "leading underscore")]
fn test_label_table(label: &str, expected: Option<LabelRejection>) {
    let mut session = Session::new(small_config());
    let result = session.add_clip(wav_clip(440.0, 0.1, 8_000, 1), label);

    match expected {
        Some(rejection) => match result {
            Err(WordmapError::InvalidLabel { reason, .. }) => assert_eq!(reason, rejection),
            other => panic!("expected {:?}, got {:?}", rejection, other),
        },
        None => assert!(result.is_ok()),
    }
}

#[test]
fn test_duplicate_label_after_normalization() {
    let mut session = Session::new(small_config());
    session.add_clip(wav_clip(440.0, 0.1, 8_000, 1), "JUMP_1").unwrap();

    let err = session
        .add_clip(wav_clip(440.0, 0.1, 8_000, 1), "jump_1")
        .unwrap_err();
    assert!(matches!(
        err,
        WordmapError::InvalidLabel {
            reason: LabelRejection::DuplicateLabel,
            ..
        }
    ));
    assert_eq!(session.clips().len(), 1);
}

// === Playback Protocol Tests ===

#[test]
fn test_segment_playback_stops_at_boundary() {
    init_tracing();
    let mut session = Session::new(small_config());
    session.add_clip(wav_clip(440.0, 2.0, 8_000, 1), "A").unwrap();
    session.add_clip(wav_clip(440.0, 3.0, 8_000, 1), "B").unwrap();
    let artifacts = session.generate().unwrap();

    let mut controller = BoundaryController::new(
        SimulatedPlayback::with_length(artifacts.total_duration),
        artifacts.index.clone(),
        BoundaryTiming::default(),
    );

    let outcome = controller.play_segment("B").unwrap();
    assert_eq!(outcome, PlayOutcome::Started(Segment::new("B", 2.5, 5.5)));
    assert!(controller
        .handle()
        .calls()
        .contains(&HandleCall::PlayFrom(2.5)));

    // Host reports a coarse position update just past the end
    controller.handle_mut().set_position(5.51);
    controller.advance_to(0.02);
    assert_eq!(controller.state(), &PlaybackState::Stopping);
    assert!(!controller.handle().is_playing());
    assert_eq!(
        controller.handle().calls().last(),
        Some(&HandleCall::Pause { at: 5.51 })
    );
    assert_eq!(controller.stop_count(), 1);

    controller.advance_to(0.1);
    assert!(controller.is_idle());
    assert_eq!(controller.pending_tasks(), 0);

    // Unknown labels are reported without touching the handle
    let calls_before = controller.handle().calls().len();
    let err = controller.play_segment("MISSING").unwrap_err();
    assert_eq!(err.error_code(), "LABEL_NOT_FOUND");
    assert_eq!(controller.handle().calls().len(), calls_before);
}

// === Artifact Output Tests ===

#[test]
fn test_artifacts_written_to_dir() {
    let mut session = Session::new(small_config());
    session.add_clip(wav_clip(440.0, 0.5, 8_000, 1), "A").unwrap();
    let artifacts = session.generate().unwrap();

    let dir = tempdir().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let paths = artifacts.write_to_dir(dir.path(), at).unwrap();

    let names: Vec<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "combined_audio_2025-01-02T03-04-05-000Z.wav".to_string(),
            "word_map.lua".to_string(),
            "sound_script.lua".to_string(),
        ]
    );

    assert_eq!(std::fs::read(&paths[0]).unwrap(), artifacts.audio);
    assert_eq!(
        std::fs::read_to_string(&paths[1]).unwrap(),
        artifacts.index_text
    );
    assert_eq!(
        std::fs::read_to_string(&paths[2]).unwrap(),
        artifacts.script_text
    );
}
