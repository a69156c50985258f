// JSON transcription report
// Notes, pitch bends and summary counts for one input

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pipeline::{Transcription, TranscriptionSummary};
use crate::segment::{Note, PitchBendEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub notes: Vec<Note>,
    pub pitch_bends: Vec<PitchBendEvent>,
    pub summary: TranscriptionSummary,
}

impl TranscriptionReport {
    pub fn new(transcription: &Transcription, source: Option<String>) -> Self {
        TranscriptionReport {
            source,
            notes: transcription.notes.clone(),
            pitch_bends: transcription.pitch_bends.clone(),
            summary: transcription.summary(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Write a pretty-printed report next to the exported MIDI
pub fn write_report(path: &Path, report: &TranscriptionReport) -> std::io::Result<()> {
    let json = report.to_json_pretty().map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}
