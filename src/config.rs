use std::{path::PathBuf, time::Duration};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "grading-worker", about = "Claims grading tasks, runs them and reports results")]
pub struct Config {
    /// Base URL of the task queue service.
    #[arg(long, env = "GRADER_API_URL")]
    pub api_url: String,

    /// Directory builds run in. Erased before every task.
    #[arg(long, env = "GRADER_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "GRADER_POLL_INTERVAL_MS", default_value_t = 5000)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "GRADER_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "GRADER_LOG", default_value = "info")]
    pub log: String,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
