//! Progress notifications for callers watching a running job.

use tokio::sync::mpsc::UnboundedSender;

use crate::domain::Compilation;

/// Snapshot sent after each completed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub job_id: String,
    pub file: String,
    /// Artifacts completed so far, including `file`.
    pub completed: usize,
}

/// Receives a callback each time an artifact is recorded on a job.
pub trait ProgressObserver: Send + Sync {
    fn artifact_completed(&self, job: &Compilation, file: &str);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn artifact_completed(&self, _job: &Compilation, _file: &str) {}
}

/// Forwards notifications over an unbounded channel.
///
/// A closed receiver is not an error; the job keeps running.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressObserver for ChannelObserver {
    fn artifact_completed(&self, job: &Compilation, file: &str) {
        let _ = self.tx.send(ProgressEvent {
            job_id: job.id.clone(),
            file: file.to_string(),
            completed: job.files.len(),
        });
    }
}
