use std::collections::HashMap;

use itertools::Itertools;

use crate::{
    constants::TEST_STEP,
    core::{
        domain::{Artifact, Outcome, Run, Stage, Task},
        traits::queue::TaskQueue,
    },
};

/// Runs submitted by earlier tasks that matter for the current one.
#[derive(Debug, Default)]
pub struct KnownRuns {
    /// Reference runs, keyed by test.
    pub baselines: HashMap<String, Run>,
    /// Earlier candidate runs of the same code and test, keyed by hash.
    pub cached: HashMap<String, Run>,
}

/// Resolves baselines and cached results for the task's runs and folds every
/// artifact into the task's runs and stages.
#[tracing::instrument(skip_all, fields(task = %task.reference))]
pub async fn score_task(task: &mut Task, artifacts: Vec<Artifact>, queue: &dyn TaskQueue) {
    let known = fetch_known_runs(&artifacts, queue).await;
    apply_artifacts(task, artifacts, &known);
}

async fn fetch_known_runs(artifacts: &[Artifact], queue: &dyn TaskQueue) -> KnownRuns {
    let hashes: Vec<String> = artifacts
        .iter()
        .filter_map(|artifact| match &artifact.outcome {
            Outcome::Scored(run) if !run.baseline => Some(run.hash.clone()),
            _ => None,
        })
        .unique()
        .collect();

    if hashes.is_empty() {
        return KnownRuns::default();
    }

    let cached = fetch_runs(queue, &hashes, false)
        .await
        .into_iter()
        .filter(|run| !run.baseline && hashes.contains(&run.hash))
        .map(|run| (run.hash.clone(), run))
        .collect::<HashMap<_, _>>();
    let baselines = fetch_runs(queue, &hashes, true)
        .await
        .into_iter()
        .filter(|run| run.baseline)
        .map(|run| (run.test.clone(), run))
        .collect::<HashMap<_, _>>();
    tracing::debug!(
        "Cached runs found: {}, baselines found: {}",
        cached.len(),
        baselines.len()
    );

    KnownRuns { baselines, cached }
}

async fn fetch_runs(queue: &dyn TaskQueue, hashes: &[String], baseline: bool) -> Vec<Run> {
    match queue.lookup_runs(hashes, baseline).await {
        Ok(runs) => runs,
        Err(e) => {
            tracing::warn!(baseline, "Could not fetch runs, scoring without them: {}", e);
            Vec::new()
        }
    }
}

/// Turns artifacts into stages in discovery order. An artifact without a run
/// becomes a system exception for its test. A run already graded by an
/// earlier task is reused and its stage marked cached. A candidate run is
/// compared against the baseline of its test, when there is one, before the
/// stage is derived.
pub fn apply_artifacts(task: &mut Task, artifacts: Vec<Artifact>, known: &KnownRuns) {
    for artifact in artifacts {
        let run = match artifact.outcome {
            Outcome::Scored(run) => run,
            Outcome::Unresolved => {
                tracing::error!(
                    task = %task.reference,
                    "No result for test {}, reporting system error",
                    artifact.test
                );
                task.report_system_error(Some(&artifact.test));
                continue;
            }
        };

        let (mut run, cached) = match known.cached.get(&run.hash) {
            Some(hit) if !run.baseline => (hit.clone(), true),
            _ => (run, false),
        };

        if !run.baseline {
            if let Some(baseline) = known.baselines.get(&run.test) {
                if let Err(e) = run.compare_to_baseline(baseline) {
                    tracing::warn!(
                        task = %task.reference,
                        "Skipping baseline for {}: {}",
                        run.test,
                        e
                    );
                }
            }
        }

        let stage = if cached {
            Stage::cached_from_run(TEST_STEP, &run)
        } else {
            Stage::from_run(TEST_STEP, &run)
        };
        task.stages.push(stage);
        task.runs.push(run);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        constants::SYSTEM_ERROR_MSG,
        core::{
            domain::StageStatus,
            traits::queue::{MockTaskQueue, QueueError},
        },
    };

    fn create_run(test: &str, score: u64, baseline: bool) -> Run {
        Run {
            hash: format!("{}-{}", test, if baseline { "base" } else { "cand" }),
            status: StageStatus::Success,
            output: "all assertions passed".to_string(),
            score,
            test: test.to_string(),
            baseline,
        }
    }

    fn create_task() -> Task {
        Task::new("7", "carol/algo@deadbeef", "http://archive/7.tar.gz")
    }

    #[test]
    fn test_scored_and_unresolved_artifacts() {
        let mut task = create_task();
        let artifacts = vec![
            Artifact::scored(create_run("sort", 100, false)),
            Artifact::unresolved("heap"),
        ];

        apply_artifacts(&mut task, artifacts, &KnownRuns::default());

        assert_eq!(task.runs, vec![create_run("sort", 100, false)]);
        assert_eq!(task.stages.len(), 2);

        assert_eq!(task.stages[0].name, "test::sort");
        assert_eq!(task.stages[0].status, StageStatus::Success);
        assert_eq!(task.stages[0].output.as_deref(), Some("all assertions passed"));
        assert!(!task.stages[0].is_system_error());

        assert_eq!(task.stages[1].name, "test::heap");
        assert_eq!(task.stages[1].status, StageStatus::Exception);
        assert_eq!(task.stages[1].test.as_deref(), Some("heap"));
        assert_eq!(task.stages[1].output.as_deref(), Some(SYSTEM_ERROR_MSG));
    }

    #[test]
    fn test_baseline_comparison_decides_stage_status() {
        let mut task = create_task();
        let known = KnownRuns {
            baselines: HashMap::from([
                ("sort".to_string(), create_run("sort", 100, true)),
                ("heap".to_string(), create_run("heap", 100, true)),
            ]),
            ..Default::default()
        };
        let artifacts = vec![
            Artifact::scored(create_run("sort", 130, false)),
            Artifact::scored(create_run("heap", 120, false)),
        ];

        apply_artifacts(&mut task, artifacts, &known);

        assert_eq!(task.stages[0].status, StageStatus::Failure);
        assert_eq!(
            task.stages[0].output.as_deref(),
            Some("Performance: 130.0% of baseline")
        );
        assert_eq!(task.stages[1].status, StageStatus::Success);
        assert_eq!(
            task.stages[1].output.as_deref(),
            Some("Performance: 120.0% of baseline")
        );
        assert_eq!(task.runs[0].status, StageStatus::Failure);
        assert_eq!(task.runs[0].output, "Performance: 130.0% of baseline");
    }

    #[test]
    fn test_zero_baseline_keeps_engine_verdict() {
        let mut task = create_task();
        let known = KnownRuns {
            baselines: HashMap::from([("sort".to_string(), create_run("sort", 0, true))]),
            ..Default::default()
        };

        apply_artifacts(
            &mut task,
            vec![Artifact::scored(create_run("sort", 130, false))],
            &known,
        );

        assert_eq!(task.stages[0].status, StageStatus::Success);
        assert_eq!(task.stages[0].output.as_deref(), Some("all assertions passed"));
    }

    #[test]
    fn test_baseline_run_is_not_compared() {
        let mut task = create_task();
        let known = KnownRuns {
            baselines: HashMap::from([("sort".to_string(), create_run("sort", 50, true))]),
            ..Default::default()
        };

        apply_artifacts(
            &mut task,
            vec![Artifact::scored(create_run("sort", 100, true))],
            &known,
        );

        assert_eq!(task.runs[0], create_run("sort", 100, true));
        assert_eq!(task.stages[0].status, StageStatus::Success);
    }

    #[tokio::test]
    async fn test_score_task_looks_up_candidate_hashes() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let requested_clone = requested.clone();

        let mut queue = MockTaskQueue::new();
        queue
            .expect_lookup_runs()
            .times(2)
            .returning(move |hashes, baseline| {
                requested_clone
                    .lock()
                    .unwrap()
                    .extend(hashes.iter().map(|hash| (hash.clone(), baseline)));
                if baseline {
                    Ok(vec![create_run("sort", 100, true)])
                } else {
                    Ok(vec![])
                }
            });

        let mut task = create_task();
        let artifacts = vec![
            Artifact::scored(create_run("sort", 130, false)),
            Artifact::scored(create_run("sort", 130, false)),
            Artifact::scored(create_run("list", 10, true)),
            Artifact::unresolved("heap"),
        ];
        score_task(&mut task, artifacts, &queue).await;

        let requested = requested.lock().unwrap();
        assert_eq!(requested.len(), 2);
        assert!(requested.contains(&("sort-cand".to_string(), true)));
        assert!(requested.contains(&("sort-cand".to_string(), false)));
        assert_eq!(task.runs.len(), 3);
        assert_eq!(task.stages.len(), 4);
        assert_eq!(task.stages[0].status, StageStatus::Failure);
        assert_eq!(task.stages[2].status, StageStatus::Success);
        assert!(task.stages[3].is_system_error());
    }

    #[tokio::test]
    async fn test_lookup_failure_scores_without_baselines() {
        let mut queue = MockTaskQueue::new();
        queue
            .expect_lookup_runs()
            .times(2)
            .return_const(Err(QueueError::Status {
                status: 503,
                message: "maintenance".to_string(),
            }));

        let mut task = create_task();
        score_task(
            &mut task,
            vec![Artifact::scored(create_run("sort", 130, false))],
            &queue,
        )
        .await;

        assert_eq!(task.stages[0].status, StageStatus::Success);
        assert_eq!(task.stages[0].output.as_deref(), Some("all assertions passed"));
    }

    #[test]
    fn test_cached_run_is_reused() {
        let mut task = create_task();
        let mut earlier = create_run("sort", 90, false);
        earlier.output = "graded earlier".to_string();
        let known = KnownRuns {
            cached: HashMap::from([("sort-cand".to_string(), earlier.clone())]),
            ..Default::default()
        };

        apply_artifacts(
            &mut task,
            vec![
                Artifact::scored(create_run("sort", 130, false)),
                Artifact::scored(create_run("heap", 10, false)),
            ],
            &known,
        );

        assert_eq!(task.runs[0], earlier);
        assert!(task.stages[0].cached);
        assert_eq!(task.stages[0].output.as_deref(), Some("graded earlier"));
        assert!(!task.stages[1].cached);
    }

    #[tokio::test]
    async fn test_cached_run_is_still_compared_to_baseline() {
        let mut queue = MockTaskQueue::new();
        queue
            .expect_lookup_runs()
            .withf(|_, baseline| !*baseline)
            .times(1)
            .returning(|_, _| Ok(vec![create_run("sort", 150, false)]));
        queue
            .expect_lookup_runs()
            .withf(|_, baseline| *baseline)
            .times(1)
            .returning(|_, _| Ok(vec![create_run("sort", 100, true)]));

        let mut task = create_task();
        score_task(
            &mut task,
            vec![Artifact::scored(create_run("sort", 150, false))],
            &queue,
        )
        .await;

        assert!(task.stages[0].cached);
        assert_eq!(task.stages[0].status, StageStatus::Failure);
        assert_eq!(
            task.stages[0].output.as_deref(),
            Some("Performance: 150.0% of baseline")
        );
    }

    #[tokio::test]
    async fn test_no_lookup_without_candidate_runs() {
        let queue = MockTaskQueue::new();

        let mut task = create_task();
        score_task(&mut task, vec![Artifact::unresolved("heap")], &queue).await;

        assert!(task.runs.is_empty());
        assert_eq!(task.stages.len(), 1);
        assert!(task.stages[0].is_system_error());
    }
}
