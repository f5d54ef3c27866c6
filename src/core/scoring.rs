use thiserror::Error;

use crate::{
    constants::BASELINE_THRESHOLD_PERMILLE,
    core::domain::{Run, StageStatus},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("baseline run {hash} has zero score")]
    ZeroBaseline { hash: String },
}

/// Ratio of `score` to `baseline` in permille, rounded half up. `baseline`
/// must be non-zero.
pub fn permille_of_baseline(score: u64, baseline: u64) -> u64 {
    let score = u128::from(score) * 1000;
    let baseline = u128::from(baseline);
    u64::try_from((score + baseline / 2) / baseline).unwrap_or(u64::MAX)
}

impl Run {
    /// Grades the run against a reference measurement of the same test.
    ///
    /// A run without a measurement (zero score) keeps the status assigned by
    /// the engine. Otherwise the output is replaced with the relative
    /// performance and the run fails when it exceeds the threshold.
    pub fn compare_to_baseline(&mut self, baseline: &Run) -> Result<(), ScoreError> {
        if self.score == 0 {
            return Ok(());
        }
        if baseline.score == 0 {
            return Err(ScoreError::ZeroBaseline {
                hash: baseline.hash.clone(),
            });
        }

        let permille = permille_of_baseline(self.score, baseline.score);
        self.output = format!(
            "Performance: {}.{}% of baseline",
            permille / 10,
            permille % 10
        );
        self.status = if permille > BASELINE_THRESHOLD_PERMILLE {
            StageStatus::Failure
        } else {
            StageStatus::Success
        };
        Ok(())
    }
}
