// Segmentation types
// Note segments, end causes and the final note / pitch bend records

use serde::{Deserialize, Serialize};

use crate::contour::OnsetSet;

/// Lowest and highest values of a 14-bit signed pitch bend
pub const PITCH_BEND_MIN: i16 = -8192;
pub const PITCH_BEND_MAX: i16 = 8191;

/// Why a note segment ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    /// Energy dropped below the release gate (or voicing was lost) long enough
    Release,

    /// An energy transient re-articulated the same pitch
    TremoloSplit,

    /// Pitch drifted away from the reference and stayed there
    SlideSplit,

    /// Frames ran out while the note was still sounding
    StreamEnd,
}

/// A run of frames that will become one note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteSegment {
    pub start_frame: usize,

    /// Exclusive end frame
    pub end_frame: usize,

    /// Conditioned pitch at the start frame, in semitones
    pub reference_pitch: f64,

    pub cause: EndCause,
}

impl NoteSegment {
    pub fn len(&self) -> usize {
        self.end_frame - self.start_frame
    }

    /// Index of the last frame belonging to the segment
    pub fn last_frame(&self) -> usize {
        self.end_frame - 1
    }
}

/// A discrete output note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI note number [0, 127]
    pub pitch: u8,

    /// MIDI velocity [1, 127]
    pub velocity: u8,

    #[serde(rename = "start")]
    pub start_time: f64,

    #[serde(rename = "end")]
    pub end_time: f64,
}

impl Note {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A pitch bend sample belonging to the note sounding at `time`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchBendEvent {
    pub time: f64,

    /// Signed bend in [-8192, 8191]
    #[serde(rename = "pitch")]
    pub value: i16,
}

/// Per-frame signals consumed by the state machine and the materializer
///
/// All slices share one length and one frame-to-time mapping.
#[derive(Debug, Clone, Copy)]
pub struct Signals<'a> {
    pub times: &'a [f64],

    /// Conditioned pitch; `None` wherever the frame is unvoiced
    pub pitch: &'a [Option<f64>],

    pub voiced: &'a [bool],

    /// Normalized energy in [0, 1]
    pub energy: &'a [f64],

    pub onsets: &'a OnsetSet,
}

impl<'a> Signals<'a> {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Inputs the state machine needs for frame `i`
    pub fn frame(&self, i: usize) -> FrameInput {
        let pitch = self.pitch[i];
        FrameInput {
            index: i,
            time: self.times[i],
            pitch,
            usable: self.voiced[i] && pitch.is_some(),
            energy: self.energy[i],
            onset: self.onsets.contains(i),
        }
    }
}

/// Everything the state machine looks at for a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    pub index: usize,
    pub time: f64,
    pub pitch: Option<f64>,

    /// Voiced and pitch-defined
    pub usable: bool,

    pub energy: f64,
    pub onset: bool,
}
