// End-to-end transcription behaviour on synthetic frame tracks

use portamento_lib::contour::{condition_pitch, OnsetStrategy, SmoothingStrategy};
use portamento_lib::segment::{PITCH_BEND_MAX, PITCH_BEND_MIN};
use portamento_lib::{EndCause, FrameTrack, Transcriber, Transcription, TranscriptionConfig};

const HOP: f64 = 0.016;

fn transcribe(track: &FrameTrack) -> Transcription {
    transcribe_with(track, TranscriptionConfig::default())
}

fn transcribe_with(track: &FrameTrack, config: TranscriptionConfig) -> Transcription {
    Transcriber::new(config)
        .unwrap()
        .transcribe(track)
        .unwrap()
}

fn track(pitch: Vec<Option<f64>>, energy: Vec<f64>) -> FrameTrack {
    let voiced = pitch.iter().map(Option::is_some).collect();
    FrameTrack::from_hop(HOP, pitch, voiced, energy).unwrap()
}

/// 60 frames around C4 with a +-0.15 semitone vibrato
fn vibrato_track() -> FrameTrack {
    let pitch = (0..60)
        .map(|i| Some(60.0 + 0.15 * (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin()))
        .collect();
    track(pitch, vec![0.5; 60])
}

/// 30 frames at C4 followed by 30 frames at D4, constant energy
fn step_track() -> FrameTrack {
    let pitch = (0..60)
        .map(|i| Some(if i < 30 { 60.0 } else { 62.0 }))
        .collect();
    track(pitch, vec![0.5; 60])
}

/// A steady E4 re-attacked every 10 frames
fn tremolo_track() -> FrameTrack {
    let cycle = [1.0, 0.8, 0.6, 0.5, 0.45, 0.4, 0.35, 0.3, 0.3, 0.3];
    let energy = (0..40).map(|i| cycle[i % 10]).collect();
    track(vec![Some(64.0); 40], energy)
}

/// Two phrases separated by silence, the second one sliding upward
fn phrase_track() -> FrameTrack {
    let mut pitch = Vec::new();
    let mut energy = Vec::new();

    for _ in 0..25 {
        pitch.push(Some(67.0));
        energy.push(0.6);
    }
    for _ in 0..15 {
        pitch.push(None);
        energy.push(0.0);
    }
    for i in 0..60 {
        pitch.push(Some(57.0 + i as f64 * 0.05));
        energy.push(0.5);
    }
    for _ in 0..10 {
        pitch.push(None);
        energy.push(0.0);
    }

    track(pitch, energy)
}

fn assert_well_formed(result: &Transcription, config: &TranscriptionConfig) {
    for note in &result.notes {
        assert!(note.pitch <= 127);
        assert!((1..=127).contains(&note.velocity));
        assert!(note.end_time > note.start_time);
        assert!(note.duration() >= config.min_note_duration_s - 1e-9);
    }

    for pair in result.notes.windows(2) {
        assert!(pair[1].start_time - pair[0].end_time >= config.min_gap_s - 1e-9);
    }

    for bend in &result.pitch_bends {
        assert!((PITCH_BEND_MIN..=PITCH_BEND_MAX).contains(&bend.value));
    }

    for pair in result.pitch_bends.windows(2) {
        assert!(pair[1].time >= pair[0].time);
    }

    // Every note's bend automation starts exactly at the note start
    for note in &result.notes {
        assert!(result
            .pitch_bends
            .iter()
            .any(|b| b.time == note.start_time));
    }
}

#[test]
fn test_silence_produces_nothing() {
    let silent = track(vec![None; 50], vec![0.0; 50]);
    let result = transcribe(&silent);

    assert!(result.notes.is_empty());
    assert!(result.pitch_bends.is_empty());
    assert_eq!(result.summary().total_notes, 0);
}

#[test]
fn test_voiced_but_quiet_produces_nothing() {
    let quiet = track(vec![Some(60.0); 50], vec![0.0; 50]);
    assert!(transcribe(&quiet).notes.is_empty());
}

#[test]
fn test_vibrato_stays_one_note() {
    let config = TranscriptionConfig::default();
    let result = transcribe(&vibrato_track());

    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].pitch, 60);
    assert_eq!(result.segments[0].cause, EndCause::StreamEnd);
    assert!(result.pitch_bends.len() > 1);
    assert!(result.pitch_bends.iter().any(|b| b.value > 0));
    assert!(result.pitch_bends.iter().any(|b| b.value < 0));
    assert_well_formed(&result, &config);
}

#[test]
fn test_pitch_step_splits_as_slide() {
    let config = TranscriptionConfig::default();
    let result = transcribe(&step_track());

    let pitches: Vec<u8> = result.notes.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![60, 62]);
    assert_eq!(result.segments[0].cause, EndCause::SlideSplit);
    assert_eq!(result.segments[1].cause, EndCause::StreamEnd);

    // The split is seamless: one hop between the notes
    let gap = result.notes[1].start_time - result.notes[0].end_time;
    assert!((gap - HOP).abs() < 1e-9);
    assert_well_formed(&result, &config);
}

#[test]
fn test_ramp_then_hold_gives_two_notes() {
    let config = TranscriptionConfig::default();
    let pitch = (0..60)
        .map(|i| match i {
            0..=19 => Some(60.0),
            20..=24 => Some(60.0 + (i - 19) as f64 * 0.2),
            _ => Some(61.0),
        })
        .collect();
    let result = transcribe(&track(pitch, vec![0.5; 60]));

    let pitches: Vec<u8> = result.notes.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![60, 61]);
    assert_eq!(result.segments[0].cause, EndCause::SlideSplit);

    // The second note starts on the split frame with the pitch found there
    let split = result.segments[1].start_frame;
    assert_eq!(split, result.segments[0].end_frame);
    assert!((result.segments[1].reference_pitch - 60.8).abs() < 1e-9);
    assert_well_formed(&result, &config);
}

#[test]
fn test_wide_drift_threshold_keeps_one_bent_note() {
    let config = TranscriptionConfig {
        slide_split_semitones: 3.0,
        pitch_bend_range: 12.0,
        ..Default::default()
    };
    let result = transcribe_with(&step_track(), config.clone());

    assert_eq!(result.notes.len(), 1);
    // +2 semitones over a 12 semitone range
    let last = result.pitch_bends.last().unwrap();
    assert_eq!(last.value, (2.0 / 12.0 * 8192.0) as i16);
    assert_well_formed(&result, &config);
}

#[test]
fn test_ramp_splits_into_ascending_notes() {
    let config = TranscriptionConfig::default();
    let pitch = (0..60).map(|i| Some(60.0 + i as f64 * 2.0 / 59.0)).collect();
    let result = transcribe(&track(pitch, vec![0.5; 60]));

    assert!(result.notes.len() >= 2);
    for pair in result.notes.windows(2) {
        assert!(pair[1].pitch >= pair[0].pitch);
    }
    let (last, rest) = result.segments.split_last().unwrap();
    assert!(rest.iter().all(|s| s.cause == EndCause::SlideSplit));
    assert!(matches!(last.cause, EndCause::SlideSplit | EndCause::StreamEnd));
    assert_well_formed(&result, &config);
}

#[test]
fn test_tremolo_reattacks_split_notes() {
    let config = TranscriptionConfig::default();
    let result = transcribe(&tremolo_track());

    assert_eq!(result.notes.len(), 4);
    assert!(result.notes.iter().all(|n| n.pitch == 64));

    let causes: Vec<EndCause> = result.segments.iter().map(|s| s.cause).collect();
    assert_eq!(
        causes,
        vec![
            EndCause::TremoloSplit,
            EndCause::TremoloSplit,
            EndCause::TremoloSplit,
            EndCause::StreamEnd,
        ]
    );
    assert_well_formed(&result, &config);
}

#[test]
fn test_onset_strategies_agree_on_clean_attacks() {
    let peaks = transcribe_with(
        &tremolo_track(),
        TranscriptionConfig {
            onsets: OnsetStrategy::peak_picking(),
            ..Default::default()
        },
    );
    let threshold = transcribe_with(
        &tremolo_track(),
        TranscriptionConfig {
            onsets: OnsetStrategy::threshold_crossing(),
            ..Default::default()
        },
    );

    assert_eq!(peaks, threshold);
}

#[test]
fn test_trailing_blip_is_dropped() {
    let mut pitch = vec![None; 40];
    let mut energy = vec![0.0; 40];
    for i in 38..40 {
        pitch[i] = Some(60.0);
        energy[i] = 1.0;
    }

    assert!(transcribe(&track(pitch, energy)).notes.is_empty());
}

#[test]
fn test_released_blip_is_dropped() {
    let config = TranscriptionConfig {
        release_frames: 1,
        ..Default::default()
    };
    let mut pitch = vec![None; 40];
    let mut energy = vec![0.0; 40];
    for i in 10..12 {
        pitch[i] = Some(60.0);
        energy[i] = 1.0;
    }

    assert!(transcribe_with(&track(pitch, energy), config).notes.is_empty());
}

#[test]
fn test_phrases_are_well_formed() {
    for smoothing in [SmoothingStrategy::InterpolateThenMedian, SmoothingStrategy::MedianOnly] {
        let config = TranscriptionConfig {
            smoothing,
            ..Default::default()
        };
        let result = transcribe_with(&phrase_track(), config.clone());

        assert!(result.notes.len() >= 2);
        assert_eq!(result.notes[0].pitch, 67);
        assert_eq!(result.segments[0].cause, EndCause::Release);
        assert_well_formed(&result, &config);
    }
}

#[test]
fn test_conditioning_preserves_undefined_frames() {
    let phrase = phrase_track();
    for strategy in [SmoothingStrategy::InterpolateThenMedian, SmoothingStrategy::MedianOnly] {
        let conditioned = condition_pitch(&phrase.pitch_semitone, &phrase.voiced, 3, strategy);

        assert_eq!(conditioned.len(), phrase.len());
        for (out, voiced) in conditioned.iter().zip(&phrase.voiced) {
            assert_eq!(out.is_some(), *voiced);
        }
    }
}

#[test]
fn test_transcription_is_deterministic() {
    let track = phrase_track();
    assert_eq!(transcribe(&track), transcribe(&track));
}
