// Transcription progress tracing
// Append-only JSONL trace of the stages each input passes through

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Transcription stage a trace entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
    Conditioning,
    Normalization,
    Onsets,
    Segmentation,
    Materialization,
    Export,
}

/// A single line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,

    /// Input the entry belongs to (file name or job id)
    pub source: String,

    pub stage: TraceStage,

    /// Overall progress of this input [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Optional structured data (frame counts, note counts, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Builds entries that all carry the same source
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    source: String,
}

impl TraceBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        TraceBuilder {
            source: source.into(),
        }
    }

    pub fn entry(&self, stage: TraceStage, progress: f32, message: impl Into<String>) -> TraceEntry {
        TraceEntry {
            timestamp: Utc::now(),
            source: self.source.clone(),
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(
        &self,
        stage: TraceStage,
        progress: f32,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> TraceEntry {
        TraceEntry {
            data: Some(data),
            ..self.entry(stage, progress, message)
        }
    }
}

/// Appends entries to a JSONL file; safe to share between concurrent jobs
#[derive(Debug)]
pub struct TraceWriter {
    file_path: PathBuf,
    lock: Mutex<()>,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter {
            file_path,
            lock: Mutex::new(()),
        }
    }

    /// Append one entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let json_line = entry.to_json_line()?;

        // A poisoned lock only means another writer panicked mid-append
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
