// Note segmentation state machine
// Single forward pass turning gated, conditioned frames into note segments
//
// Gating uses hysteresis (gate_on > gate_off). Splits happen on:
// - release: too many quiet or unvoiced frames in a row
// - tremolo: an energy onset at roughly the reference pitch
// - slide: pitch held away from the reference for several frames

use crate::config::TranscriptionConfig;
use super::types::{EndCause, FrameInput, NoteSegment, Signals};

/// Idle or inside a note
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Idle,
    InNote {
        start: usize,

        /// Conditioned pitch at `start`
        reference: f64,
    },
}

/// State carried from one frame to the next
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterState {
    pub phase: Phase,

    /// Consecutive frames that were quiet or unvoiced
    pub release_count: u32,

    /// Consecutive frames held past the slide threshold
    pub slide_count: u32,

    /// Frames left during which onsets cannot split the note
    pub cooldown: u32,

    /// End time of the last emitted (or dropped) note, seconds
    pub last_note_end: f64,
}

impl Default for SegmenterState {
    fn default() -> Self {
        SegmenterState {
            phase: Phase::Idle,
            release_count: 0,
            slide_count: 0,
            cooldown: 0,
            last_note_end: f64::NEG_INFINITY,
        }
    }
}

impl SegmenterState {
    fn open(&mut self, start: usize, reference: f64, config: &TranscriptionConfig) {
        self.phase = Phase::InNote { start, reference };
        self.release_count = 0;
        self.slide_count = 0;
        self.cooldown = config.cooldown_frames;
    }

    fn close(&mut self, config: &TranscriptionConfig) {
        self.phase = Phase::Idle;
        self.release_count = 0;
        self.slide_count = 0;
        self.cooldown = config.cooldown_frames;
    }
}

/// Advance the machine by one frame
///
/// `times` is the full frame clock; release rollback and duration checks look
/// at earlier frames. Returns the new state and the segment closed on this
/// frame, if any.
pub fn step(
    state: SegmenterState,
    frame: &FrameInput,
    times: &[f64],
    config: &TranscriptionConfig,
) -> (SegmenterState, Option<NoteSegment>) {
    let mut next = state;
    next.cooldown = next.cooldown.saturating_sub(1);

    let (start, reference) = match state.phase {
        Phase::Idle => {
            let gap_ok = frame.time - next.last_note_end >= config.min_gap_s;
            if frame.usable && frame.energy >= config.gate_on && gap_ok {
                if let Some(pitch) = frame.pitch {
                    next.open(frame.index, pitch, config);
                }
            }
            return (next, None);
        }
        Phase::InNote { start, reference } => (start, reference),
    };

    if !frame.usable || frame.energy < config.gate_off {
        next.release_count += 1;
    } else {
        next.release_count = 0;
    }

    let deviation = frame.pitch.map(|p| p - reference);
    let elapsed = frame.time - times[start];

    let tremolo = frame.onset
        && next.cooldown == 0
        && deviation.map_or(false, |d| d.abs() <= config.tremolo_pitch_tolerance)
        && elapsed >= config.min_note_duration_s;

    if frame.usable && deviation.map_or(false, |d| d.abs() >= config.slide_split_semitones) {
        next.slide_count += 1;
    } else {
        next.slide_count = 0;
    }
    let slide = next.slide_count >= config.slide_hold_frames;

    let release = next.release_count >= config.release_frames;

    if !(tremolo || slide || release) {
        return (next, None);
    }

    let i = frame.index;
    let mut end = if release {
        i.saturating_sub(config.release_frames as usize).max(start + 1)
    } else {
        i
    };

    if times[end - 1] - times[start] < config.min_note_duration_s {
        end = i;
        if times[end - 1] - times[start] < config.min_note_duration_s {
            log::debug!(
                "Dropping short segment at frames {}..{} ({:.3}s)",
                start,
                end,
                times[end - 1] - times[start]
            );
            next.close(config);
            next.last_note_end = times[end - 1];
            return (next, None);
        }
    }

    let cause = if release {
        EndCause::Release
    } else if slide {
        EndCause::SlideSplit
    } else {
        EndCause::TremoloSplit
    };

    let segment = NoteSegment {
        start_frame: start,
        end_frame: end,
        reference_pitch: reference,
        cause,
    };
    next.last_note_end = times[end - 1];

    match frame.pitch {
        Some(pitch) if (tremolo || slide) && frame.usable => next.open(i, pitch, config),
        _ => next.close(config),
    }

    (next, Some(segment))
}

/// Close whatever is still open once the frames run out
///
/// The open segment runs through the final frame with no release rollback.
/// It is still dropped when shorter than the minimum note duration.
pub fn finish(
    state: &SegmenterState,
    times: &[f64],
    config: &TranscriptionConfig,
) -> Option<NoteSegment> {
    let Phase::InNote { start, reference } = state.phase else {
        return None;
    };

    let end = times.len();
    let duration = times[end - 1] - times[start];
    if duration < config.min_note_duration_s {
        log::debug!(
            "Dropping short trailing segment at frames {}..{} ({:.3}s)",
            start,
            end,
            duration
        );
        return None;
    }

    Some(NoteSegment {
        start_frame: start,
        end_frame: end,
        reference_pitch: reference,
        cause: EndCause::StreamEnd,
    })
}

/// Run the machine over every frame and collect the emitted segments
pub fn segment_frames(signals: &Signals, config: &TranscriptionConfig) -> Vec<NoteSegment> {
    let mut state = SegmenterState::default();
    let mut segments = Vec::new();

    for i in 0..signals.len() {
        let frame = signals.frame(i);
        let (next, emitted) = step(state, &frame, signals.times, config);
        state = next;
        segments.extend(emitted);
    }

    segments.extend(finish(&state, signals.times, config));
    segments
}
