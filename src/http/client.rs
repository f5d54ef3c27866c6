use std::time::Duration;

use serde::{Deserialize, de::DeserializeOwned};

use crate::core::{
    domain::{Run, Stage, Task},
    traits::queue::{QueueError, TaskQueue},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// JSON-over-HTTP client for the task queue service.
#[derive(Debug, Clone)]
pub struct HttpQueue {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpQueue {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueueError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Transport {
                url: base_url.to_string(),
                msg: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn parse_url(&self, path: &str) -> Result<reqwest::Url, QueueError> {
        let url = self.url(path);
        reqwest::Url::parse(&url).map_err(|e| QueueError::Transport {
            url,
            msg: e.to_string(),
        })
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<String, QueueError> {
        let resp = req.send().await.map_err(|e| QueueError::Transport {
            url: url.to_string(),
            msg: e.to_string(),
        })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| QueueError::Transport {
            url: url.to_string(),
            msg: e.to_string(),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) => err.message,
                Err(_) => preview_body(&body),
            };
            return Err(QueueError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    fn decode<T: DeserializeOwned>(body: &str, url: &str) -> Result<T, QueueError> {
        serde_json::from_str(body).map_err(|e| QueueError::Decode {
            url: url.to_string(),
            msg: format!("{} | body={}", e, preview_body(body)),
        })
    }
}

#[async_trait::async_trait]
impl TaskQueue for HttpQueue {
    async fn claim_task(&self) -> Result<Option<Task>, QueueError> {
        let url = self.url("/tasks/dequeue");
        let body = self.send(self.http.post(&url), &url).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let task: Option<Task> = Self::decode(&body, &url)?;
        Ok(task.filter(|task| !task.id.is_empty()))
    }

    async fn submit_runs(&self, task_ref: &str, runs: &[Run]) -> Result<(), QueueError> {
        let url = self.url("/runs");
        tracing::debug!(task = %task_ref, "Submitting {} runs", runs.len());
        self.send(self.http.put(&url).json(runs), &url).await?;
        Ok(())
    }

    async fn submit_report(&self, task_id: &str, stages: &[Stage]) -> Result<(), QueueError> {
        let mut url = self.parse_url("/tasks")?;
        url.path_segments_mut()
            .map_err(|()| QueueError::Transport {
                url: self.url("/tasks"),
                msg: "base URL cannot have path segments".to_string(),
            })?
            .push(task_id);
        let url = url.to_string();
        self.send(self.http.post(&url).json(stages), &url).await?;
        Ok(())
    }

    async fn lookup_runs(
        &self,
        hashes: &[String],
        baseline: bool,
    ) -> Result<Vec<Run>, QueueError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = self.parse_url("/runs")?;
        url.query_pairs_mut()
            .extend_pairs(hashes.iter().map(|hash| ("hash", hash.as_str())))
            .append_pair("baseline", if baseline { "true" } else { "false" });
        let url = url.to_string();

        let body = self.send(self.http.get(&url), &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Self::decode::<Option<Vec<Run>>>(&body, &url).map(Option::unwrap_or_default)
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    if trimmed.chars().count() <= BODY_PREVIEW_LIMIT {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    out.push_str("...");
    out
}
