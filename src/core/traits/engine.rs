use std::path::Path;

use thiserror::Error;

use crate::core::domain::BuildOutput;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("failed to fetch archive {url}: {msg}")]
    Fetch { url: String, msg: String },
    #[error("internal engine error: {msg}")]
    Internal { msg: String },
}

/// Builds a source archive inside a workspace and executes every test it
/// discovers.
///
/// Build problems caused by the submitted code are reported as stages in the
/// output. An `Err` means the engine itself could not do its job. Every
/// discovered test must come back as exactly one artifact, with
/// [`Outcome::Unresolved`](crate::core::domain::Outcome::Unresolved) when no
/// measurement was obtained, and equal code and test must hash equally.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Engine: std::fmt::Debug + Send + Sync {
    async fn build_tests(
        &self,
        workspace: &Path,
        archive_url: &str,
    ) -> Result<BuildOutput, EngineError>;
}
