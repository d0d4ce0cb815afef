//! Review-voice training pipeline: scrape a reviewer's comment history and
//! turn it into a LoRA adapter.
//!
//! Two stages, called in order by the webhook orchestrator:
//! 1) [`scraper`] — walk the repository's PRs, collect the reviewer's inline
//!    comments with surrounding code context, and write chat-format training
//!    examples to the per-user data path.
//! 2) [`finetune`] — hand the data path to the external fine-tuning service
//!    and poll the job until it reaches a terminal state. The training run
//!    itself (GPU, checkpoints) is the service's business, not ours.

pub mod errors;
pub mod finetune;
pub mod paths;
pub mod scraper;

pub use errors::{TrainerError, TrainerResult};
pub use finetune::TrainerClient;
pub use scraper::scrape_reviewer_history;
