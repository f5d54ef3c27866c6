use thiserror::Error;

use crate::core::domain::{Run, Stage, Task};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("request to {url} failed: {msg}")]
    Transport { url: String, msg: String },
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode response from {url}: {msg}")]
    Decode { url: String, msg: String },
}

/// The remote service that hands out tasks and stores their results.
#[mockall::automock]
#[async_trait::async_trait]
pub trait TaskQueue: std::fmt::Debug + Send + Sync {
    /// Returns `Ok(None)` when there is nothing to grade.
    async fn claim_task(&self) -> Result<Option<Task>, QueueError>;

    async fn submit_runs(&self, task_ref: &str, runs: &[Run]) -> Result<(), QueueError>;

    /// Closes the task on the service side.
    async fn submit_report(&self, task_id: &str, stages: &[Stage]) -> Result<(), QueueError>;

    /// Previously submitted runs with the given hashes. `baseline` selects
    /// reference runs instead of earlier candidate runs.
    async fn lookup_runs(
        &self,
        hashes: &[String],
        baseline: bool,
    ) -> Result<Vec<Run>, QueueError>;
}
