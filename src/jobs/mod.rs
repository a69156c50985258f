// Jobs module
// Concurrent, isolated transcription runs with status tracking

pub mod models;
pub mod queue;

pub use models::{JobRecord, JobStatus};
pub use queue::{JobError, JobQueue};
