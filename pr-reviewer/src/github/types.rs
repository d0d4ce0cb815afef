//! Data model for GitHub pull requests and review comments.
//!
//! These are the "normalized outputs" of the GitHub layer, consumed by the
//! review pipeline and by the comment-history scraper.

use serde::{Deserialize, Serialize};

/// A unique reference to a repository (`owner/repo`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoLocator {
    pub owner: String,
    pub repo: String,
}

/// A unique reference to a pull request inside a repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrLocator {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrLocator {
    pub fn repo(&self) -> RepoLocator {
        RepoLocator {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
        }
    }
}

/// One entry of the "list PR files" response.
///
/// `patch` is a unified diff for text files; absent for binary or too-large
/// diffs, in which case the pipeline falls back to a synthetic hunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrFile {
    pub filename: String,
    #[serde(default)]
    pub patch: Option<String>,
}

/// Minimal user shape (`login` is all we ever key on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhUser {
    pub login: String,
}

/// A pull request as returned by the list endpoint (subset of fields).
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub user: GhUser,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// A commit reference inside a PR (used to resolve `commit_id` for posting).
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// A historical inline review comment, as scraped for training data.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCommentRecord {
    pub id: u64,
    pub body: String,
    pub user: GhUser,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub start_line: Option<i64>,
    #[serde(default)]
    pub original_line: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Rate-limit headers attached to a page of results, so the scraper can
/// back off before GitHub starts rejecting requests.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub remaining: u64,
    /// Unix timestamp at which the limit window resets.
    pub reset_epoch: u64,
}
