//! Background job driving one accepted webhook delivery end to end:
//! scrape the reviewer's comment history, fine-tune their voice adapter,
//! then review the PR. Progress lands on the PR as issue comments so the
//! commenter can follow along; any stage failure ends the job with a
//! best-effort failure notice.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use pr_reviewer::github::{GitHubClient, PrLocator};
use voice_llm_service::VllmService;
use voice_trainer::{TrainerClient, scrape_reviewer_history};

use crate::core::app_state::AppState;
use crate::routes::webhook::event::ReviewJob;

#[derive(Debug, Error)]
enum JobError {
    #[error(transparent)]
    Review(#[from] pr_reviewer::errors::Error),

    #[error(transparent)]
    Trainer(#[from] voice_trainer::TrainerError),

    #[error(transparent)]
    Llm(#[from] voice_llm_service::VllmError),
}

pub async fn run_review_job(state: Arc<AppState>, job: ReviewJob, token: String) {
    if let Err(e) = drive(&state, &job, &token).await {
        warn!(
            "job: review of {}/{}#{} as {} failed: {e}",
            job.repo_owner, job.repo_name, job.pr_number, job.reviewer
        );
        notify_failure(&state, &job, &token).await;
    }
}

async fn drive(state: &AppState, job: &ReviewJob, token: &str) -> Result<(), JobError> {
    let github = GitHubClient::new(
        state.github_api_base.clone(),
        token.to_string(),
        Duration::from_secs(state.http_timeout_secs),
    )?;
    let pr = PrLocator {
        owner: job.repo_owner.clone(),
        repo: job.repo_name.clone(),
        number: job.pr_number,
    };

    status(&github, &pr, &format!(
        "Got it! Collecting @{}'s review history, this can take a few minutes...",
        job.reviewer
    ))
    .await;

    let examples = scrape_reviewer_history(&github, &pr.repo(), &job.reviewer).await?;
    if examples == 0 {
        status(&github, &pr, &format!(
            "I couldn't find any review comments by @{} in this repository, so there is nothing to learn from yet.",
            job.reviewer
        ))
        .await;
        return Ok(());
    }

    status(&github, &pr, &format!(
        "Collected {examples} examples. Fine-tuning @{}'s review voice (grab a coffee)...",
        job.reviewer
    ))
    .await;

    let trainer = TrainerClient::new(state.trainer_url.clone())?;
    trainer
        .run(&job.reviewer, &job.repo_owner, &job.repo_name)
        .await?;

    status(&github, &pr, &format!(
        "Model ready. Reviewing this PR in @{}'s voice...",
        job.reviewer
    ))
    .await;

    let llm = VllmService::new(state.llm_config.clone())?;
    let report = pr_reviewer::run_review(&github, &llm, &pr, &job.reviewer).await?;

    info!(
        "job: {}/{}#{} done, {} posted / {} skipped / {} failed",
        job.repo_owner,
        job.repo_name,
        job.pr_number,
        report.posted(),
        report.skipped(),
        report.failed()
    );
    status(&github, &pr, &format!(
        "Done! Posted {} comment(s) in @{}'s voice ({} hunk(s) had nothing to say).",
        report.posted(),
        job.reviewer,
        report.skipped()
    ))
    .await;

    Ok(())
}

/// Progress comments are informational; losing one never fails the job.
async fn status(github: &GitHubClient, pr: &PrLocator, body: &str) {
    if let Err(e) = github.post_issue_comment(pr, body).await {
        warn!("job: status comment on #{} failed: {e}", pr.number);
    }
}

async fn notify_failure(state: &AppState, job: &ReviewJob, token: &str) {
    let Ok(github) = GitHubClient::new(
        state.github_api_base.clone(),
        token.to_string(),
        Duration::from_secs(state.http_timeout_secs),
    ) else {
        return;
    };
    let pr = PrLocator {
        owner: job.repo_owner.clone(),
        repo: job.repo_name.clone(),
        number: job.pr_number,
    };
    status(
        &github,
        &pr,
        &format!(
            "Sorry @{}, something went wrong while reviewing in @{}'s voice. Please try again later.",
            job.commenter, job.reviewer
        ),
    )
    .await;
}
