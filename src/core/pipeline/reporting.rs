use crate::core::{
    domain::Task,
    traits::queue::{QueueError, TaskQueue},
};

/// Persists the task's runs and closes the task with its stages.
///
/// Losing runs only costs future caching and baseline lookups, so that
/// failure is logged and swallowed. A failed report leaves the task open on
/// the service and is returned to the caller.
#[tracing::instrument(skip_all, fields(task = %task.reference))]
pub async fn report_task(task: &Task, queue: &dyn TaskQueue) -> Result<(), QueueError> {
    if !task.runs.is_empty() {
        if let Err(e) = queue.submit_runs(&task.reference, &task.runs).await {
            tracing::warn!("Could not submit runs: {}", e);
        }
    }

    if let Err(e) = queue.submit_report(&task.id, &task.stages).await {
        tracing::error!("Could not finish task {}: {}", task.id, e);
        return Err(e);
    }

    tracing::info!(
        elapsed_ms = (chrono::Utc::now() - task.claimed_at).num_milliseconds(),
        system_error = task.has_system_error(),
        "Finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;

    use super::*;
    use crate::core::{
        domain::{Artifact, Run, StageStatus},
        pipeline::scoring::apply_artifacts,
        traits::queue::MockTaskQueue,
    };

    fn create_task_with_run() -> Task {
        let mut task = Task::new("9", "dave/hw@cafe", "http://archive/9.tar.gz");
        let run = Run {
            hash: "h1".to_string(),
            status: StageStatus::Success,
            output: "ok".to_string(),
            score: 10,
            test: "sort".to_string(),
            baseline: false,
        };
        apply_artifacts(&mut task, vec![Artifact::scored(run)], &Default::default());
        task
    }

    #[tokio::test]
    async fn test_runs_are_submitted_before_report() {
        let mut seq = Sequence::new();
        let mut queue = MockTaskQueue::new();
        queue
            .expect_submit_runs()
            .withf(|task_ref, runs| task_ref == "dave/hw@cafe" && runs.len() == 1)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(Ok(()));
        queue
            .expect_submit_report()
            .withf(|task_id, stages| task_id == "9" && stages.len() == 1)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(Ok(()));

        report_task(&create_task_with_run(), &queue).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_submission_failure_is_tolerated() {
        let mut queue = MockTaskQueue::new();
        queue
            .expect_submit_runs()
            .times(1)
            .return_const(Err(QueueError::Transport {
                url: "http://queue/runs".to_string(),
                msg: "connection refused".to_string(),
            }));
        queue.expect_submit_report().times(1).return_const(Ok(()));

        report_task(&create_task_with_run(), &queue).await.unwrap();
    }

    #[tokio::test]
    async fn test_report_failure_is_returned() {
        let mut queue = MockTaskQueue::new();
        queue.expect_submit_runs().return_const(Ok(()));
        queue
            .expect_submit_report()
            .times(1)
            .return_const(Err(QueueError::Status {
                status: 500,
                message: "db down".to_string(),
            }));

        let err = report_task(&create_task_with_run(), &queue)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            QueueError::Status {
                status: 500,
                message: "db down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_no_runs_skips_run_submission() {
        let mut queue = MockTaskQueue::new();
        queue.expect_submit_report().times(1).return_const(Ok(()));

        let mut task = Task::new("9", "dave/hw@cafe", "http://archive/9.tar.gz");
        task.report_system_error(None);
        report_task(&task, &queue).await.unwrap();
    }
}
