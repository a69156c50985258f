// Input module
// Loads per-frame pitch tracker output for transcription

pub mod frames;

pub use frames::{read_frame_track, FrameTrack, FrameTrackError};
