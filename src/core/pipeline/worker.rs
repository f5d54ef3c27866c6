use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::watch;

use crate::core::{
    domain::{Task, TaskState},
    pipeline::{
        building::build_task, cancelled, reporting::report_task, scoring::score_task,
    },
    traits::{
        engine::Engine,
        queue::{QueueError, TaskQueue},
    },
    workspace::WorkspaceSlot,
};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("could not claim task: {0}")]
    Claim(#[source] QueueError),
    #[error("could not report task {task_id}: {source}")]
    Report { task_id: String, source: QueueError },
}

/// Pulls tasks from the queue one at a time and drives each through
/// build, scoring and reporting.
#[derive(Debug)]
pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    engine: Arc<dyn Engine>,
    workspace: WorkspaceSlot,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        engine: Arc<dyn Engine>,
        workspace: WorkspaceSlot,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            engine,
            workspace,
            poll_interval,
        }
    }

    /// Polls the queue until shutdown is requested. A task that is in flight
    /// when shutdown arrives is still reported before the loop exits.
    #[tracing::instrument(skip_all)]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(workspace = %self.workspace.root().display(), "Worker started");

        while !*shutdown.borrow() {
            let idle = match self.process_next(&mut shutdown).await {
                Ok(TaskState::Idle) => true,
                Ok(_) => false,
                Err(WorkerError::Claim(e)) => {
                    tracing::warn!("Could not claim task: {}", e);
                    true
                }
                // Already logged by the reporting phase.
                Err(WorkerError::Report { .. }) => false,
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = cancelled(&mut shutdown) => break,
                }
            }
        }

        tracing::info!("Worker stopped");
    }

    /// Claims and fully processes at most one task.
    ///
    /// Returns [`TaskState::Idle`] when the queue was empty, otherwise the
    /// state the task ended in: [`TaskState::Done`] or [`TaskState::Failed`].
    pub async fn process_next(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<TaskState, WorkerError> {
        let Some(mut task) = self.queue.claim_task().await.map_err(WorkerError::Claim)? else {
            tracing::debug!("No task available");
            return Ok(TaskState::Idle);
        };
        log_transition(&task, TaskState::Claimed);

        let state = self.process_task(&mut task, shutdown).await;
        if task.stages.is_empty() {
            tracing::error!(task = %task.reference, "Nothing to report, reporting system error");
            task.report_system_error(None);
        }

        log_transition(&task, TaskState::Reporting);
        report_task(&task, self.queue.as_ref())
            .await
            .map_err(|source| WorkerError::Report {
                task_id: task.id.clone(),
                source,
            })?;

        log_transition(&task, state.clone());
        Ok(state)
    }

    async fn process_task(
        &mut self,
        task: &mut Task,
        shutdown: &mut watch::Receiver<bool>,
    ) -> TaskState {
        log_transition(task, TaskState::Building);

        let workspace = match self.workspace.acquire().await {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::error!(task = %task.reference, "Workspace reset failed: {}", e);
                task.report_system_error(None);
                return TaskState::Failed;
            }
        };

        let built = build_task(task, self.engine.as_ref(), &workspace, shutdown).await;
        workspace.release().await;
        let artifacts = match built {
            Ok(artifacts) => artifacts,
            Err(e) => {
                tracing::error!(task = %task.reference, "Build failed: {}", e);
                task.report_system_error(None);
                return TaskState::Failed;
            }
        };

        log_transition(task, TaskState::Scoring);
        score_task(task, artifacts, self.queue.as_ref()).await;

        TaskState::Done
    }
}

fn log_transition(task: &Task, state: TaskState) {
    tracing::info!(task = %task.reference, id = %task.id, state = ?state, "Task state changed");
}
