// Transcription pipeline
// Conditioner / normalizer / onset detector -> state machine -> materializer

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, TranscriptionConfig};
use crate::contour::{condition_pitch, detect_onsets, normalize_energy};
use crate::input::FrameTrack;
use crate::segment::{materialize, segment_frames, Note, NoteSegment, PitchBendEvent, Signals};
use super::trace::{TraceBuilder, TraceStage, TraceWriter};

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Notes and pitch bends for one input, in time order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub notes: Vec<Note>,
    pub pitch_bends: Vec<PitchBendEvent>,

    /// Segments the notes were built from, one per note
    pub segments: Vec<NoteSegment>,
}

/// Counts reported alongside a transcription
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionSummary {
    pub total_notes: usize,
    pub total_pitch_bends: usize,

    /// End of the last note in seconds
    pub duration: f64,
}

impl Transcription {
    pub fn summary(&self) -> TranscriptionSummary {
        TranscriptionSummary {
            total_notes: self.notes.len(),
            total_pitch_bends: self.pitch_bends.len(),
            duration: self
                .notes
                .iter()
                .map(|n| n.end_time)
                .fold(0.0, f64::max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Validated, immutable transcription settings
///
/// Cheap to share between threads; every call to `transcribe` is independent.
#[derive(Debug, Clone)]
pub struct Transcriber {
    config: TranscriptionConfig,
}

impl Transcriber {
    /// Validate the configuration up front so a run can never produce NaN
    /// notes from degenerate parameters
    pub fn new(config: TranscriptionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Transcriber { config })
    }

    pub fn config(&self) -> &TranscriptionConfig {
        &self.config
    }

    pub fn transcribe(&self, track: &FrameTrack) -> Result<Transcription, TranscribeError> {
        self.run(track, None)
    }

    /// Transcribe while appending per-stage progress to a trace file
    ///
    /// Trace write failures are logged and otherwise ignored.
    pub fn transcribe_traced(
        &self,
        track: &FrameTrack,
        writer: &TraceWriter,
        source: &str,
    ) -> Result<Transcription, TranscribeError> {
        self.run(track, Some((writer, TraceBuilder::new(source))))
    }

    fn run(
        &self,
        track: &FrameTrack,
        trace: Option<(&TraceWriter, TraceBuilder)>,
    ) -> Result<Transcription, TranscribeError> {
        track.validate()?;
        let config = &self.config;

        let emit = |stage: TraceStage, progress: f32, message: String, data: serde_json::Value| {
            if let Some((writer, builder)) = &trace {
                let entry = builder.with_data(stage, progress, message, data);
                if let Err(e) = writer.write(&entry) {
                    log::warn!("Failed to write trace entry: {}", e);
                }
            }
        };

        let pitch = condition_pitch(
            &track.pitch_semitone,
            &track.voiced,
            config.odd_median_window(),
            config.smoothing,
        );
        let defined = pitch.iter().filter(|p| p.is_some()).count();
        emit(
            TraceStage::Conditioning,
            0.2,
            format!("Conditioned {} frames", track.len()),
            serde_json::json!({ "frames": track.len(), "voiced_frames": defined }),
        );

        let energy = normalize_energy(&track.energy);
        emit(
            TraceStage::Normalization,
            0.4,
            "Normalized energy".to_string(),
            serde_json::json!({ "frames": energy.len() }),
        );

        let onsets = detect_onsets(&energy, &config.onsets);
        log::debug!("Detected {} onsets", onsets.len());
        emit(
            TraceStage::Onsets,
            0.6,
            format!("Detected {} onsets", onsets.len()),
            serde_json::json!({ "onsets": onsets.len() }),
        );

        let signals = Signals {
            times: &track.times,
            pitch: &pitch,
            voiced: &track.voiced,
            energy: &energy,
            onsets: &onsets,
        };

        let segments = segment_frames(&signals, config);
        emit(
            TraceStage::Segmentation,
            0.8,
            format!("Found {} segments", segments.len()),
            serde_json::json!({ "segments": segments.len() }),
        );

        let mut transcription = Transcription::default();
        for segment in segments {
            if let Some((note, bends)) = materialize(&segment, &signals, config) {
                transcription.notes.push(note);
                transcription.pitch_bends.extend(bends);
                transcription.segments.push(segment);
            }
        }

        let summary = transcription.summary();
        emit(
            TraceStage::Materialization,
            1.0,
            format!(
                "Materialized {} notes and {} pitch bends",
                summary.total_notes, summary.total_pitch_bends
            ),
            serde_json::to_value(summary).unwrap_or(serde_json::Value::Null),
        );

        log::info!(
            "Transcribed {} frames: notes={} bends={}",
            track.len(),
            summary.total_notes,
            summary.total_pitch_bends
        );

        Ok(transcription)
    }
}
