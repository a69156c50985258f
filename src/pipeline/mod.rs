// Pipeline execution and monitoring module
// Orchestrates a full frame-track-to-notes transcription

pub mod trace;
pub mod transcribe;

pub use trace::{read_trace_file, TraceBuilder, TraceEntry, TraceError, TraceStage, TraceWriter};
pub use transcribe::{TranscribeError, Transcriber, Transcription, TranscriptionSummary};
