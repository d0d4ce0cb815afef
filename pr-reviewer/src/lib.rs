//! Public entry for the pr-reviewer pipeline.
//!
//! Reviews a GitHub pull request in the voice of a target reviewer:
//!
//! 1) **Diff I/O** — fetch the PR's changed files (`patch` = unified diff)
//!    through the GitHub layer.
//! 2) **Hunk parsing** — split each patch into hunks and map added lines to
//!    new-file line numbers (`parser`).
//! 3) **Generation** — per hunk, stream a comment from the reviewer's LoRA
//!    adapter via `voice-llm-service`, buffering to one string.
//! 4) **Posting** — anchor each non-empty comment at the hunk's first added
//!    line and post it as an inline review comment, tolerating per-hunk
//!    failure.
//!
//! The pipeline uses `tracing` for debug logging and avoids `async-trait`
//! and heap trait objects (no `Box<dyn ...>`). Collaborators are plain trait
//! seams implemented by the concrete GitHub and vLLM clients.

pub mod errors;
pub mod github;
pub mod parser;
pub mod pipeline;

use std::time::Instant;
use tracing::debug;

use errors::PrResult;
use github::{GitHubClient, PrLocator};
use pipeline::{ReviewPipeline, ReviewReport};
use voice_llm_service::VllmService;

/// Run the whole review pipeline for a single PR and return the per-unit
/// report.
///
/// This is the single public entry to call from an HTTP handler once the
/// webhook layer has resolved the reviewer identity and a usable token.
///
/// # Logging
/// Emits `DEBUG` logs per stage (`review: ...`) and an `INFO` summary with
/// posted/skipped/failed counts.
pub async fn run_review(
    github: &GitHubClient,
    llm: &VllmService,
    pr: &PrLocator,
    reviewer: &str,
) -> PrResult<ReviewReport> {
    let t0 = Instant::now();
    debug!(
        "review: start {}/{}#{} as {}",
        pr.owner, pr.repo, pr.number, reviewer
    );

    let pipeline = ReviewPipeline::new(github.clone(), llm.clone(), github.clone());
    let report = pipeline.review_all_files(pr, reviewer).await?;

    debug!(
        "review: finished in {} ms (posted={}, skipped={}, failed={})",
        t0.elapsed().as_millis(),
        report.posted(),
        report.skipped(),
        report.failed()
    );
    Ok(report)
}
