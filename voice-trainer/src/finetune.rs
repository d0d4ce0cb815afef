//! Thin client for the external fine-tuning service.
//!
//! The service owns GPUs, checkpoints, and the actual LoRA training run; we
//! only submit a job for a (reviewer, repo) pair and poll until it reaches a
//! terminal state. The job reads the training data from the shared per-user
//! data path and writes the adapter next to it (see [`crate::paths`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{TrainerError, TrainerResult};
use crate::paths;

/// Default polling cadence while a job is in flight.
const POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Default overall deadline for one fine-tune run.
const DEFAULT_DEADLINE_SECS: u64 = 2 * 60 * 60;

/// Terminal and in-flight job states reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TrainerClient {
    http: reqwest::Client,
    base_url: String,
    deadline_secs: u64,
}

impl TrainerClient {
    /// Constructs a client for the trainer service at `base_url`.
    pub fn new(base_url: String) -> TrainerResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("pr-voice-backend/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            deadline_secs: DEFAULT_DEADLINE_SECS,
        })
    }

    /// Overrides the overall deadline for [`TrainerClient::wait`].
    pub fn with_deadline_secs(mut self, secs: u64) -> Self {
        self.deadline_secs = secs;
        self
    }

    /// Submits a fine-tune job for the reviewer's scraped data and returns
    /// the job id.
    pub async fn submit(
        &self,
        reviewer: &str,
        repo_owner: &str,
        repo_name: &str,
    ) -> TrainerResult<String> {
        let req = SubmitJobRequest {
            username: reviewer,
            repo_owner,
            repo_name,
            data_path: paths::user_data_path(reviewer, repo_name)
                .display()
                .to_string(),
            adapter_path: paths::user_adapter_path(reviewer, repo_name)
                .display()
                .to_string(),
        };
        let url = format!("{}/jobs", self.base_url);
        debug!("finetune: POST {url} for {reviewer}");
        let resp: SubmitJobResponse = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!("finetune: job {} submitted for {reviewer}", resp.id);
        Ok(resp.id)
    }

    /// Polls the job until it succeeds, fails, or the deadline elapses.
    pub async fn wait(&self, job_id: &str) -> TrainerResult<()> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.deadline_secs);

        loop {
            let status: JobStatusResponse = self
                .http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match status.status {
                JobStatus::Succeeded => {
                    info!("finetune: job {job_id} succeeded");
                    return Ok(());
                }
                JobStatus::Failed => {
                    return Err(TrainerError::JobFailed {
                        job_id: job_id.to_string(),
                        reason: status.error.unwrap_or_else(|| "unknown".into()),
                    });
                }
                JobStatus::Queued | JobStatus::Running => {
                    debug!("finetune: job {job_id} still {:?}", status.status);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(TrainerError::JobTimeout {
                    job_id: job_id.to_string(),
                    secs: self.deadline_secs,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Convenience: submit and wait in one call.
    pub async fn run(
        &self,
        reviewer: &str,
        repo_owner: &str,
        repo_name: &str,
    ) -> TrainerResult<()> {
        let job_id = self.submit(reviewer, repo_owner, repo_name).await?;
        self.wait(&job_id).await
    }
}

/// Request body for POST /jobs.
#[derive(Debug, Serialize)]
struct SubmitJobRequest<'a> {
    username: &'a str,
    repo_owner: &'a str,
    repo_name: &'a str,
    data_path: String,
    adapter_path: String,
}

/// Response body for POST /jobs.
#[derive(Debug, Deserialize)]
struct SubmitJobResponse {
    id: String,
}

/// Response body for GET /jobs/{id}.
#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: JobStatus,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_decodes_snake_case() {
        let s: JobStatusResponse =
            serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert_eq!(s.status, JobStatus::Running);

        let s: JobStatusResponse =
            serde_json::from_str(r#"{"status":"failed","error":"oom"}"#).unwrap();
        assert_eq!(s.status, JobStatus::Failed);
        assert_eq!(s.error.as_deref(), Some("oom"));
    }
}
