// Note segmentation module
// State machine, segment types, and note / pitch bend materialization

pub mod machine;
pub mod materialize;
pub mod types;

pub use machine::{finish, segment_frames, step, Phase, SegmenterState};
pub use materialize::{bend_value, materialize, root_pitch, velocity};
pub use types::{
    EndCause, FrameInput, Note, NoteSegment, PitchBendEvent, Signals, PITCH_BEND_MAX,
    PITCH_BEND_MIN,
};
