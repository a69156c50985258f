// Note and pitch bend materialization
// Quantizes a segment's root, derives velocity, and thins bend automation

use crate::config::TranscriptionConfig;
use super::types::{Note, NoteSegment, PitchBendEvent, Signals, PITCH_BEND_MAX, PITCH_BEND_MIN};

/// Velocity curve: normalized energy^0.6 mapped onto [28, 112]
const VELOCITY_EXPONENT: f64 = 0.6;
const VELOCITY_FLOOR: f64 = 28.0;
const VELOCITY_CEIL: f64 = 112.0;

/// Shortest note length emitted even for single-frame segments
const MIN_NOTE_LENGTH_S: f64 = 1e-3;

/// Root pitch: snap to the quantization grid, then to the nearest semitone
///
/// Both roundings send exact halves to the even neighbour.
pub fn root_pitch(reference: f64, quantization_step: f64) -> u8 {
    let on_grid = (reference / quantization_step).round_ties_even() * quantization_step;
    on_grid.round_ties_even().clamp(0.0, 127.0) as u8
}

pub fn velocity(energy: f64) -> u8 {
    let curved = energy.clamp(0.0, 1.0).powf(VELOCITY_EXPONENT);
    let v = (VELOCITY_FLOOR + curved * (VELOCITY_CEIL - VELOCITY_FLOOR)) as i32;
    v.clamp(1, 127) as u8
}

/// Bend value for a deviation in semitones, truncated toward zero
pub fn bend_value(deviation: f64, bend_range: f64) -> i16 {
    let scaled = (deviation / bend_range) * 8192.0;
    scaled.clamp(PITCH_BEND_MIN as f64, PITCH_BEND_MAX as f64) as i16
}

/// Turn a segment into a note and its thinned pitch bend sequence
///
/// Returns `None` if the start frame has no pitch, which the state machine
/// never produces.
pub fn materialize(
    segment: &NoteSegment,
    signals: &Signals,
    config: &TranscriptionConfig,
) -> Option<(Note, Vec<PitchBendEvent>)> {
    let start = segment.start_frame;
    let start_pitch = signals.pitch[start]?;

    let root = root_pitch(start_pitch, config.quantization_step);
    let start_time = signals.times[start];
    let end_time = signals.times[segment.last_frame()].max(start_time + MIN_NOTE_LENGTH_S);

    let note = Note {
        pitch: root,
        velocity: velocity(signals.energy[start]),
        start_time,
        end_time,
    };

    let bends = thin_bends(segment, signals, root, config);
    Some((note, bends))
}

/// Emit a bend at the note start, then only when the bend moved by at least
/// the configured step or too many frames have passed since the last one
fn thin_bends(
    segment: &NoteSegment,
    signals: &Signals,
    root: u8,
    config: &TranscriptionConfig,
) -> Vec<PitchBendEvent> {
    let range = config.pitch_bend_range;
    let step_units = (config.bend_semitone_step / range * 8192.0) as i32;
    let max_skip = config.bend_max_frame_skip as usize;
    let root = root as f64;

    let start = segment.start_frame;
    let mut bends = Vec::new();

    let Some(start_pitch) = signals.pitch[start] else {
        return bends;
    };
    let mut last_value = bend_value(start_pitch - root, range);
    let mut last_index = start;
    bends.push(PitchBendEvent {
        time: signals.times[start],
        value: last_value,
    });

    for j in start + 1..segment.end_frame {
        let Some(pitch) = signals.pitch[j] else {
            continue;
        };

        let value = bend_value(pitch - root, range);
        let moved = (value as i32 - last_value as i32).abs() >= step_units;
        if moved || j - last_index >= max_skip {
            bends.push(PitchBendEvent {
                time: signals.times[j],
                value,
            });
            last_value = value;
            last_index = j;
        }
    }

    bends
}
