//! Comment-history scraper.
//!
//! Walks every PR of the repository, collects the target reviewer's inline
//! review comments together with the code they were written against, and
//! saves chat-format training examples (system / user / assistant turns)
//! compatible with the fine-tuning service.
//!
//! The user turn is framed with the same prompt helpers the serving side
//! uses, so the adapter sees identical input at train and inference time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use pr_reviewer::github::{GitHubClient, RateLimit, RepoLocator, ReviewCommentRecord};
use pr_reviewer::parser::split_into_hunks;
use voice_llm_service::prompt;

use crate::errors::TrainerResult;
use crate::paths;

/// Page cap for the PR list (first 3000 PRs at 100 per page).
const MAX_PR_PAGES: u32 = 30;
const PAGE_SIZE: u32 = 100;
/// Lines of surrounding code kept on each side of the commented range.
const CONTEXT_LINES: i64 = 10;
/// Back off once GitHub reports fewer remaining requests than this.
const RATE_LIMIT_FLOOR: u64 = 10;

/// One chat turn of a training example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// One scraped training example in chat format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub messages: Vec<ChatTurn>,
}

/// Scrapes the reviewer's comment history and writes the training data file.
///
/// Returns the number of examples collected; zero means the reviewer has no
/// usable inline comments in this repository (the caller decides how to tell
/// the user). Nothing is written when the count is zero.
pub async fn scrape_reviewer_history(
    github: &GitHubClient,
    repo: &RepoLocator,
    reviewer: &str,
) -> TrainerResult<usize> {
    info!(
        "scrape: collecting PRs of {}/{} for reviewer {}",
        repo.owner, repo.repo, reviewer
    );

    let mut prs = Vec::new();
    let mut page = 1;
    loop {
        let (batch, rate) = github.list_pulls_page(repo, page, PAGE_SIZE).await?;
        if batch.is_empty() {
            break;
        }
        debug!("scrape: page {page}, got {} PRs", batch.len());
        prs.extend(batch);
        maybe_backoff(rate).await;
        page += 1;
        if page > MAX_PR_PAGES {
            break;
        }
    }

    info!("scrape: processing {} PRs", prs.len());
    let mut examples = Vec::new();

    for pr in &prs {
        let mut page = 1;
        loop {
            let (batch, rate) = github
                .list_review_comments_page(repo, pr.number, page, PAGE_SIZE)
                .await?;
            if batch.is_empty() {
                break;
            }
            for comment in &batch {
                if comment.user.login != reviewer || comment.body.trim().is_empty() {
                    continue;
                }
                match build_example(github, repo, reviewer, comment).await {
                    Ok(Some(example)) => examples.push(example),
                    Ok(None) => {}
                    Err(e) => {
                        // A single unreadable context never sinks the scrape.
                        warn!(
                            "scrape: skipping comment {} on PR #{}: {e}",
                            comment.id, pr.number
                        );
                    }
                }
            }
            maybe_backoff(rate).await;
            page += 1;
        }
    }

    if examples.is_empty() {
        info!("scrape: no usable comments for {reviewer}");
        return Ok(0);
    }

    let data_path = paths::user_data_path(reviewer, &repo.repo);
    if let Some(dir) = data_path.parent() {
        fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_vec_pretty(&examples)?;
    fs::write(&data_path, json).await?;

    info!(
        "scrape: collected {} examples for {reviewer} at {}",
        examples.len(),
        data_path.display()
    );
    Ok(examples.len())
}

/// Builds one training example from a scraped comment, or `None` when the
/// comment carries no resolvable code context.
async fn build_example(
    github: &GitHubClient,
    repo: &RepoLocator,
    reviewer: &str,
    comment: &ReviewCommentRecord,
) -> TrainerResult<Option<TrainingExample>> {
    let (Some(path), Some(commit_id)) = (&comment.path, &comment.commit_id) else {
        return Ok(None);
    };

    let Some(content) = github.get_file_content(repo, path, commit_id).await? else {
        return Ok(None);
    };

    let (start_line, end_line) = commented_range(comment);
    let lines: Vec<&str> = content.split('\n').collect();
    let context_start = (start_line - 1 - CONTEXT_LINES).max(0) as usize;
    let context_end = ((end_line + CONTEXT_LINES) as usize).min(lines.len());
    if context_start >= context_end {
        return Ok(None);
    }
    let code_context = lines[context_start..context_end].join("\n");

    Ok(Some(TrainingExample {
        messages: vec![
            ChatTurn {
                role: "system".into(),
                content: prompt::system_prompt_for(reviewer),
            },
            ChatTurn {
                role: "user".into(),
                content: prompt::user_prompt_for(path, &code_context),
            },
            ChatTurn {
                role: "assistant".into(),
                content: comment.body.clone(),
            },
        ],
    }))
}

/// Resolves the 1-based line range a comment targets.
///
/// Prefers the API's line fields; falls back to the `diff_hunk` header when
/// they are absent (older comments), estimating the end from the hunk size.
fn commented_range(comment: &ReviewCommentRecord) -> (i64, i64) {
    let mut start = comment.start_line.or(comment.original_line);
    let mut end = comment.line.or(start);

    if (start.is_none() || end.is_none())
        && let Some(diff_hunk) = &comment.diff_hunk
        && let Some(hunk) = split_into_hunks(diff_hunk).first()
    {
        let s = i64::from(hunk.new_start);
        start = Some(s);
        // Hunk line count minus header approximates the commented span.
        end = Some(s + diff_hunk.lines().count() as i64 - 2);
    }

    let start = start.or(end).unwrap_or(1).max(1);
    let end = end.unwrap_or(start).max(start);
    (start, end)
}

/// Sleeps until the rate-limit window resets when headroom is gone.
async fn maybe_backoff(rate: Option<RateLimit>) {
    let Some(rate) = rate else { return };
    if rate.remaining >= RATE_LIMIT_FLOOR {
        return;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let wait = rate.reset_epoch.saturating_sub(now) + 5;
    if wait > 0 {
        warn!("scrape: rate limit approaching, sleeping {wait}s");
        tokio::time::sleep(Duration::from_secs(wait)).await;
    }
}
