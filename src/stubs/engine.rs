use std::{path::Path, time::Duration};

use crate::core::{
    domain::BuildOutput,
    traits::engine::{Engine, EngineError},
};

/// Engine that answers every build with a fixed result after a delay.
#[derive(Debug, Clone)]
pub struct EngineStub {
    result: Result<BuildOutput, EngineError>,
    delay: Duration,
}

impl EngineStub {
    pub fn new(result: Result<BuildOutput, EngineError>, delay: Duration) -> Self {
        Self { result, delay }
    }
}

#[async_trait::async_trait]
impl Engine for EngineStub {
    #[tracing::instrument]
    async fn build_tests(
        &self,
        workspace: &Path,
        archive_url: &str,
    ) -> Result<BuildOutput, EngineError> {
        tracing::debug!(
            "Start build: workspace={:?}, archive_url={:?}",
            workspace,
            archive_url
        );
        tokio::time::sleep(self.delay).await;
        tracing::debug!("Build result: {:?}", self.result);

        self.result.clone()
    }
}
