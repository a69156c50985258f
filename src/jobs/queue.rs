// Job queue
// Runs each submitted frame track as an isolated blocking transcription

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use super::models::{JobRecord, JobStatus};
use crate::input::FrameTrack;
use crate::pipeline::{TraceWriter, Transcriber, Transcription};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {0} has not finished")]
    NotFinished(Uuid),

    #[error("Job {id} failed: {message}")]
    Failed { id: Uuid, message: String },
}

struct JobSlot {
    /// Submission order; timestamps can collide
    seq: u64,
    record: JobRecord,
    result: Option<Transcription>,
    status_tx: watch::Sender<JobStatus>,
}

type JobMap = Arc<Mutex<HashMap<Uuid, JobSlot>>>;

/// In-memory registry of transcription jobs
///
/// Jobs share one validated `Transcriber` and an optional trace writer but
/// nothing else; a failing job never affects another.
#[derive(Clone)]
pub struct JobQueue {
    transcriber: Arc<Transcriber>,
    trace: Option<Arc<TraceWriter>>,
    jobs: JobMap,
    next_seq: Arc<AtomicU64>,
}

impl JobQueue {
    pub fn new(transcriber: Transcriber) -> Self {
        JobQueue {
            transcriber: Arc::new(transcriber),
            trace: None,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record per-stage progress of every job in one trace file
    pub fn with_trace(mut self, writer: Arc<TraceWriter>) -> Self {
        self.trace = Some(writer);
        self
    }

    /// Queue a transcription and return its id immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, source: impl Into<String>, track: FrameTrack) -> Uuid {
        let record = JobRecord::new(source);
        let id = record.id;
        let source = record.source.clone();
        let (status_tx, _) = watch::channel(JobStatus::Pending);

        lock(&self.jobs).insert(
            id,
            JobSlot {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                record,
                result: None,
                status_tx,
            },
        );
        log::debug!("Queued job {} for {}", id, source);

        let jobs = Arc::clone(&self.jobs);
        let transcriber = Arc::clone(&self.transcriber);
        let trace = self.trace.clone();

        tokio::spawn(async move {
            let worker_jobs = Arc::clone(&jobs);
            let outcome = tokio::task::spawn_blocking(move || {
                update(&worker_jobs, id, |slot| slot.record.mark_running());
                match &trace {
                    Some(writer) => transcriber.transcribe_traced(&track, writer, &source),
                    None => transcriber.transcribe(&track),
                }
            })
            .await;

            update(&jobs, id, |slot| match outcome {
                Ok(Ok(transcription)) => {
                    slot.record.mark_done(transcription.summary());
                    slot.result = Some(transcription);
                }
                Ok(Err(e)) => {
                    log::warn!("Job {} failed: {}", id, e);
                    slot.record.mark_failed(e.to_string());
                }
                Err(e) => {
                    log::error!("Job {} aborted: {}", id, e);
                    slot.record.mark_failed(format!("worker aborted: {}", e));
                }
            });
        });

        id
    }

    pub fn status(&self, id: Uuid) -> Result<JobRecord, JobError> {
        lock(&self.jobs)
            .get(&id)
            .map(|slot| slot.record.clone())
            .ok_or(JobError::NotFound(id))
    }

    /// Transcription of a finished job
    pub fn result(&self, id: Uuid) -> Result<Transcription, JobError> {
        let jobs = lock(&self.jobs);
        let slot = jobs.get(&id).ok_or(JobError::NotFound(id))?;

        match slot.record.status {
            JobStatus::Done => slot.result.clone().ok_or(JobError::NotFinished(id)),
            JobStatus::Failed => Err(JobError::Failed {
                id,
                message: slot.record.error.clone().unwrap_or_default(),
            }),
            JobStatus::Pending | JobStatus::Running => Err(JobError::NotFinished(id)),
        }
    }

    /// Wait until the job reaches `done` or `failed` and return its record
    pub async fn wait(&self, id: Uuid) -> Result<JobRecord, JobError> {
        let mut rx = lock(&self.jobs)
            .get(&id)
            .map(|slot| slot.status_tx.subscribe())
            .ok_or(JobError::NotFound(id))?;

        // The sender lives in the map, so the channel outlives every waiter
        rx.wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| JobError::NotFound(id))?;

        self.status(id)
    }

    /// Drop a finished or failed job and return its final record
    pub fn remove(&self, id: Uuid) -> Result<JobRecord, JobError> {
        let mut jobs = lock(&self.jobs);
        let slot = jobs.get(&id).ok_or(JobError::NotFound(id))?;
        if !slot.record.status.is_terminal() {
            return Err(JobError::NotFinished(id));
        }

        let record = jobs
            .remove(&id)
            .map(|slot| slot.record)
            .ok_or(JobError::NotFound(id))?;
        log::debug!("Removed job {}", id);
        Ok(record)
    }

    /// All jobs, oldest first
    pub fn list(&self) -> Vec<JobRecord> {
        let jobs = lock(&self.jobs);
        let mut slots: Vec<&JobSlot> = jobs.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.record.clone()).collect()
    }
}

fn lock(jobs: &JobMap) -> MutexGuard<'_, HashMap<Uuid, JobSlot>> {
    jobs.lock().unwrap_or_else(|e| e.into_inner())
}

/// Apply `f` to a job and publish its new status
fn update(jobs: &JobMap, id: Uuid, f: impl FnOnce(&mut JobSlot)) {
    let mut jobs = lock(jobs);
    if let Some(slot) = jobs.get_mut(&id) {
        f(slot);
        slot.status_tx.send_replace(slot.record.status);
    }
}
