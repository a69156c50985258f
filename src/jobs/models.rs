// Data models for transcription jobs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::pipeline::TranscriptionSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// No further transitions happen from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,

    /// Input name the job was submitted with
    pub source: String,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobStatus,

    /// Failure message when `status` is `Failed`
    pub error: Option<String>,

    /// Counts of the finished transcription when `status` is `Done`
    pub summary: Option<TranscriptionSummary>,
}

impl JobRecord {
    pub fn new(source: impl Into<String>) -> Self {
        JobRecord {
            id: Uuid::new_v4(),
            source: source.into(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            status: JobStatus::Pending,
            error: None,
            summary: None,
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_done(&mut self, summary: TranscriptionSummary) {
        self.status = JobStatus::Done;
        self.summary = Some(summary);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
    }
}
