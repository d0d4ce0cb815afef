//! Error hierarchy for the training pipeline.

use thiserror::Error;

pub type TrainerResult<T> = Result<T, TrainerError>;

#[derive(Debug, Error)]
pub enum TrainerError {
    /// GitHub layer failure while scraping (PR list, comments, contents).
    #[error(transparent)]
    Provider(#[from] pr_reviewer::errors::Error),

    /// Transport failure talking to the fine-tuning service.
    #[error("trainer transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Training-data file I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Training-data serialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The fine-tuning service reported a terminal failure.
    #[error("fine-tune job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    /// The fine-tuning job did not finish within the deadline.
    #[error("fine-tune job {job_id} timed out after {secs}s")]
    JobTimeout { job_id: String, secs: u64 },

    /// Unexpected/invalid shape of a trainer-service response.
    #[error("invalid trainer response: {0}")]
    InvalidResponse(String),
}
