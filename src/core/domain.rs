use serde::{Deserialize, Serialize};

use crate::constants::{SYSTEM_ERROR_MSG, SYSTEM_STAGE, TEST_STEP};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(rename = "archive", default)]
    pub archive_url: String,
    #[serde(skip, default = "chrono::Utc::now")]
    pub claimed_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip)]
    pub stages: Vec<Stage>,
    #[serde(skip)]
    pub runs: Vec<Run>,
}

impl Task {
    pub fn new(id: &str, reference: &str, archive_url: &str) -> Self {
        Self {
            id: id.to_string(),
            reference: reference.to_string(),
            archive_url: archive_url.to_string(),
            claimed_at: chrono::Utc::now(),
            stages: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Appends an `exception` stage for a failure caused by the infrastructure
    /// rather than the submitted code. The candidate only ever sees the
    /// generic administrator message.
    pub fn report_system_error(&mut self, test: Option<&str>) {
        let name = match test {
            Some(test) => format!("{}::{}", TEST_STEP, test),
            None => SYSTEM_STAGE.to_string(),
        };
        self.stages.push(Stage {
            name,
            status: StageStatus::Exception,
            test: test.map(str::to_string),
            output: Some(SYSTEM_ERROR_MSG.to_string()),
            run: None,
            cached: false,
        });
    }

    pub fn has_system_error(&self) -> bool {
        self.stages.iter().any(Stage::is_system_error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failure,
    Exception,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHash {
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunHash>,
    #[serde(rename = "is_cached", default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl Stage {
    /// Projects a run onto a reportable stage named `<step>::<test>`.
    pub fn from_run(step: &str, run: &Run) -> Self {
        Self {
            name: format!("{}::{}", step, run.test),
            status: run.status,
            test: Some(run.test.clone()),
            output: Some(run.output.clone()),
            run: Some(RunHash {
                hash: run.hash.clone(),
            }),
            cached: false,
        }
    }

    /// Same as [`Stage::from_run`] for a run reused from an earlier task.
    pub fn cached_from_run(step: &str, run: &Run) -> Self {
        Self {
            cached: true,
            ..Self::from_run(step, run)
        }
    }

    pub fn is_system_error(&self) -> bool {
        self.status == StageStatus::Exception && self.run.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub hash: String,
    pub status: StageStatus,
    pub output: String,
    pub score: u64,
    pub test: String,
    pub baseline: bool,
}

/// What the engine managed to produce for a discovered test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Scored(Run),
    /// The test was discovered but never produced a measurement
    /// (crash, timeout or an infrastructure fault).
    Unresolved,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub test: String,
    pub outcome: Outcome,
}

impl Artifact {
    pub fn scored(run: Run) -> Self {
        Self {
            test: run.test.clone(),
            outcome: Outcome::Scored(run),
        }
    }

    pub fn unresolved(test: &str) -> Self {
        Self {
            test: test.to_string(),
            outcome: Outcome::Unresolved,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub stages: Vec<Stage>,
    pub artifacts: Vec<Artifact>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Claimed,
    Building,
    Scoring,
    Reporting,
    Done,
    Failed,
}
