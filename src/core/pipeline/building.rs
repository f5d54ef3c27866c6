use thiserror::Error;
use tokio::sync::watch;

use crate::core::{
    domain::{Artifact, Task},
    pipeline::cancelled,
    traits::engine::{Engine, EngineError},
    workspace::Workspace,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("build cancelled")]
    Cancelled,
}

/// Runs the engine on the task's archive. Stages produced by the build are
/// appended to the task immediately; the discovered artifacts are returned
/// for scoring.
#[tracing::instrument(skip_all, fields(task = %task.reference))]
pub async fn build_task(
    task: &mut Task,
    engine: &dyn Engine,
    workspace: &Workspace<'_>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Vec<Artifact>, BuildError> {
    tracing::debug!("Start building {}", task.archive_url);

    let output = tokio::select! {
        output = engine.build_tests(workspace.path(), &task.archive_url) => output?,
        _ = cancelled(shutdown) => return Err(BuildError::Cancelled),
    };

    task.stages.extend(output.stages);
    tracing::info!("Build completed, tests found: {}", output.artifacts.len());

    Ok(output.artifacts)
}
