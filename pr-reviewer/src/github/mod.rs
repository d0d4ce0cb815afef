//! GitHub REST v3 client for PR review plumbing.
//!
//! Endpoints used:
//! - GET  /repos/{owner}/{repo}/pulls                       (scrape: PR list)
//! - GET  /repos/{owner}/{repo}/pulls/{number}/files        (field "patch" is unified diff)
//! - GET  /repos/{owner}/{repo}/pulls/{number}/commits      (resolve commit_id)
//! - GET  /repos/{owner}/{repo}/pulls/{number}/comments     (scrape: review comments)
//! - GET  /repos/{owner}/{repo}/contents/{path}?ref=...     (scrape: file at commit)
//! - POST /repos/{owner}/{repo}/pulls/{number}/comments     (inline review comment)
//! - POST /repos/{owner}/{repo}/issues/{number}/comments    (status/auth notices)

pub mod types;
pub use types::*;

use crate::errors::{ConfigError, PrResult, ProviderError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default GitHub REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String, // "https://api.github.com"
    token: String,    // "token <PAT or OAuth token>"
}

impl GitHubClient {
    /// Constructs a client with its own HTTP instance and a bounded timeout.
    pub fn new(base_api: String, token: String, timeout: Duration) -> PrResult<Self> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken.into());
        }
        if !(base_api.starts_with("http://") || base_api.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_api).into());
        }
        let http = Client::builder()
            .user_agent("pr-voice-backend/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Constructs a client around a shared reqwest instance.
    pub fn with_http(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Fetches the changed-files list of a PR. `patch` may be absent for
    /// binary or too-large diffs.
    pub async fn list_pr_files(&self, pr: &PrLocator) -> PrResult<Vec<PrFile>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/files",
            self.base_api, pr.owner, pr.repo, pr.number
        );
        let files: Vec<PrFile> = self
            .auth(self.http.get(url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(files)
    }

    /// Fetches the commits of a PR, oldest first (GitHub order).
    pub async fn list_pr_commits(&self, pr: &PrLocator) -> PrResult<Vec<CommitRef>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/commits",
            self.base_api, pr.owner, pr.repo, pr.number
        );
        let commits: Vec<CommitRef> = self
            .auth(self.http.get(url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(commits)
    }

    /// Posts an inline review comment anchored at `line` of the new file.
    ///
    /// Resolves `commit_id` from the PR's latest commit first; a failed
    /// resolution is logged and the POST attempted anyway (GitHub rejects it,
    /// which surfaces as `Ok(false)` like any other posting failure).
    ///
    /// Returns `Ok(true)` on HTTP 200/201, `Ok(false)` on any other status.
    /// Only transport-level failures produce an `Err`.
    pub async fn post_review_comment(
        &self,
        pr: &PrLocator,
        body: &str,
        path: &str,
        line: u32,
    ) -> PrResult<bool> {
        let commit_id = match self.list_pr_commits(pr).await {
            Ok(commits) => commits.last().map(|c| c.sha.clone()),
            Err(e) => {
                warn!("could not resolve commit id for {}#{}: {e}", pr.repo, pr.number);
                None
            }
        };

        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_api, pr.owner, pr.repo, pr.number
        );
        let payload = ReviewCommentPayload {
            body,
            commit_id: commit_id.as_deref(),
            path,
            line,
        };
        let resp = self.auth(self.http.post(url)).json(&payload).send().await?;
        let status = resp.status().as_u16();
        if matches!(status, 200 | 201) {
            debug!("comment posted to {}#{} {}:{}", pr.repo, pr.number, path, line);
            Ok(true)
        } else {
            let text = resp.text().await.unwrap_or_default();
            let snippet = text.chars().take(240).collect::<String>();
            warn!(
                "failed to post comment to {}#{}: status {status} - {snippet}",
                pr.repo, pr.number
            );
            Ok(false)
        }
    }

    /// Posts a plain (non-inline) comment on the PR conversation. Best-effort:
    /// non-201 statuses are logged, never escalated.
    pub async fn post_issue_comment(&self, pr: &PrLocator, body: &str) -> PrResult<()> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_api, pr.owner, pr.repo, pr.number
        );
        let resp = self
            .auth(self.http.post(url))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status != 201 {
            let text = resp.text().await.unwrap_or_default();
            let snippet = text.chars().take(240).collect::<String>();
            warn!(
                "failed to post status comment to {}#{}: status {status} - {snippet}",
                pr.repo, pr.number
            );
        }
        Ok(())
    }

    /// Fetches one page of the repository's PRs (any state).
    pub async fn list_pulls_page(
        &self,
        repo: &RepoLocator,
        page: u32,
        per_page: u32,
    ) -> PrResult<(Vec<PullRequest>, Option<RateLimit>)> {
        let url = format!("{}/repos/{}/{}/pulls", self.base_api, repo.owner, repo.repo);
        let resp = self
            .auth(self.http.get(url))
            .query(&[
                ("state", "all"),
                ("page", &page.to_string()),
                ("per_page", &per_page.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let rate = rate_limit_from(resp.headers());
        let prs: Vec<PullRequest> = resp.json().await?;
        Ok((prs, rate))
    }

    /// Fetches one page of a PR's inline review comments.
    pub async fn list_review_comments_page(
        &self,
        repo: &RepoLocator,
        pr_number: u64,
        page: u32,
        per_page: u32,
    ) -> PrResult<(Vec<ReviewCommentRecord>, Option<RateLimit>)> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_api, repo.owner, repo.repo, pr_number
        );
        let resp = self
            .auth(self.http.get(url))
            .query(&[
                ("page", &page.to_string()),
                ("per_page", &per_page.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let rate = rate_limit_from(resp.headers());
        let comments: Vec<ReviewCommentRecord> = resp.json().await?;
        Ok((comments, rate))
    }

    /// Fetches a file's content at a specific git ref via the contents API.
    ///
    /// Returns `Ok(None)` if the file does not exist at that ref (404) or
    /// the response carries no inline content (e.g. files over 1 MiB).
    pub async fn get_file_content(
        &self,
        repo: &RepoLocator,
        path: &str,
        git_ref: &str,
    ) -> PrResult<Option<String>> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_api, repo.owner, repo.repo, path
        );
        let resp = self
            .auth(self.http.get(url))
            .query(&[("ref", git_ref)])
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let contents: ContentsResponse = resp.error_for_status()?.json().await?;
        let Some(encoded) = contents.content else {
            return Ok(None);
        };
        // GitHub wraps base64 payloads with newlines.
        let compact: String = encoded.split_whitespace().collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| ProviderError::InvalidResponse(format!("bad base64 content: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ProviderError::InvalidResponse(format!("non-utf8 content: {e}")))?;
        Ok(Some(text))
    }
}

/// Request body for POST /pulls/{n}/comments. `commit_id` serializes to
/// `null` when unresolved, mirroring what GitHub expects us to correct.
#[derive(Debug, Serialize)]
struct ReviewCommentPayload<'a> {
    body: &'a str,
    commit_id: Option<&'a str>,
    path: &'a str,
    line: u32,
}

/// Response body for the contents API (subset of fields we actually use).
#[derive(Debug, serde::Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: Option<String>,
}

fn rate_limit_from(headers: &HeaderMap) -> Option<RateLimit> {
    let remaining = headers
        .get("X-RateLimit-Remaining")?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    let reset_epoch = headers
        .get("X-RateLimit-Reset")?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    Some(RateLimit {
        remaining,
        reset_epoch,
    })
}
