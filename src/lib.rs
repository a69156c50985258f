// Portamento - Pitch track to microtonal MIDI transcriber
// Module declarations

pub mod config;
pub mod contour;
pub mod export;
pub mod input;
pub mod jobs;
pub mod pipeline;
pub mod segment;

pub use config::{ConfigError, SettingsOverrides, TranscriptionConfig};
pub use input::FrameTrack;
pub use pipeline::{Transcriber, Transcription, TranscriptionSummary};
pub use segment::{EndCause, Note, PitchBendEvent};
