//! Typed webhook payloads and the accept/ignore decision.
//!
//! Only the `issue_comment` event matters here; everything else is filtered
//! out by header before the body is parsed. Payloads that do not decode into
//! the expected shape are a hard error rather than a silent skip, so a
//! misconfigured webhook shows up in the sender's delivery log.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("payload is not a valid issue_comment event: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: Issue,
    pub comment: IssueComment,
    pub repository: Repository,
}

#[derive(Debug, Deserialize)]
pub struct Issue {
    pub number: u64,
    /// Present only when the issue is actually a pull request.
    #[serde(default)]
    pub pull_request: Option<PullRequestMarker>,
}

/// Marker object; its presence is all we check.
#[derive(Debug, Deserialize)]
pub struct PullRequestMarker {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IssueComment {
    pub body: String,
    pub user: Account,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Account,
}

/// Everything the background job needs, extracted from an accepted event.
#[derive(Debug, Clone)]
pub struct ReviewJob {
    pub repo_owner: String,
    pub repo_name: String,
    pub pr_number: u64,
    /// Who asked for the review (posts the request comment).
    pub commenter: String,
    /// Whose review voice to imitate.
    pub reviewer: String,
}

pub fn parse_event(body: &[u8]) -> Result<IssueCommentEvent, EventError> {
    Ok(serde_json::from_slice(body)?)
}

/// Decides whether an event triggers a review. `Err` carries the reason the
/// delivery is acknowledged but skipped.
pub fn classify(event: &IssueCommentEvent, mention: &str) -> Result<ReviewJob, &'static str> {
    if event.action != "created" {
        return Err("comment action is not 'created'");
    }
    if event.issue.pull_request.is_none() {
        return Err("comment is not on a pull request");
    }
    let Some((_, after_mention)) = event.comment.body.split_once(mention) else {
        return Err("bot is not mentioned");
    };

    let commenter = event.comment.user.login.clone();
    // First word after the mention names the reviewer to imitate; with no
    // word there, the commenter wants their own voice.
    let reviewer = after_mention
        .split_whitespace()
        .next()
        .map(|w| w.trim_start_matches('@').to_string())
        .filter(|w| !w.is_empty())
        .unwrap_or_else(|| commenter.clone());

    Ok(ReviewJob {
        repo_owner: event.repository.owner.login.clone(),
        repo_name: event.repository.name.clone(),
        pr_number: event.issue.number,
        commenter,
        reviewer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENTION: &str = "@tech-lead-bot";

    fn payload(action: &str, body: &str, is_pr: bool) -> Vec<u8> {
        let pull_request = if is_pr {
            r#", "pull_request": {"url": "https://api.github.com/repos/o/r/pulls/7"}"#
        } else {
            ""
        };
        format!(
            r#"{{
                "action": "{action}",
                "issue": {{"number": 7{pull_request}}},
                "comment": {{"body": "{body}", "user": {{"login": "alice"}}}},
                "repository": {{"name": "widgets", "owner": {{"login": "acme"}}}}
            }}"#
        )
        .into_bytes()
    }

    #[test]
    fn mention_with_target_user_is_accepted() {
        let event = parse_event(&payload("created", "@tech-lead-bot @octocat", true)).unwrap();
        let job = classify(&event, MENTION).unwrap();
        assert_eq!(job.repo_owner, "acme");
        assert_eq!(job.repo_name, "widgets");
        assert_eq!(job.pr_number, 7);
        assert_eq!(job.commenter, "alice");
        assert_eq!(job.reviewer, "octocat");
    }

    #[test]
    fn bare_mention_falls_back_to_commenter() {
        let event = parse_event(&payload("created", "@tech-lead-bot", true)).unwrap();
        let job = classify(&event, MENTION).unwrap();
        assert_eq!(job.reviewer, "alice");
    }

    #[test]
    fn edited_comments_are_skipped() {
        let event = parse_event(&payload("edited", "@tech-lead-bot @octocat", true)).unwrap();
        assert!(classify(&event, MENTION).is_err());
    }

    #[test]
    fn plain_issues_are_skipped() {
        let event = parse_event(&payload("created", "@tech-lead-bot", false)).unwrap();
        assert_eq!(
            classify(&event, MENTION).unwrap_err(),
            "comment is not on a pull request"
        );
    }

    #[test]
    fn missing_mention_is_skipped() {
        let event = parse_event(&payload("created", "looks good to me", true)).unwrap();
        assert_eq!(classify(&event, MENTION).unwrap_err(), "bot is not mentioned");
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_event(b"{\"action\": 42}").is_err());
        assert!(parse_event(b"not json").is_err());
    }
}
