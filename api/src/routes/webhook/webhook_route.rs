use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use pr_reviewer::github::{GitHubClient, PrLocator};

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};
use crate::routes::webhook::{event, orchestrator};

#[derive(Serialize)]
struct WebhookAccepted {
    status: &'static str,
    reviewer: String,
    pr_number: u64,
}

/// GitHub webhook endpoint.
///
/// On a PR comment mentioning the bot, kicks off the scrape → fine-tune →
/// review job in the background and acknowledges immediately. Every
/// delivery is answered with 200 so the sender never retries; skipped
/// deliveries say why in the envelope.
#[instrument(name = "webhook_route", skip(state, headers, body))]
pub async fn webhook_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let kind = headers
        .get("X-GitHub-Event")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if kind != "issue_comment" {
        return ApiResponse::ignored("not an issue_comment event");
    }

    // Dedup comes before any payload inspection: a retried delivery is
    // answered from the guard alone, whatever its content.
    if let Some(delivery) = headers
        .get("X-GitHub-Delivery")
        .and_then(|h| h.to_str().ok())
        && !state.deliveries.first_delivery(delivery)
    {
        info!("webhook: duplicate delivery {delivery}");
        return ApiResponse::ignored("duplicate delivery");
    }

    let parsed = match event::parse_event(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("webhook: {e}");
            return ApiResponse::ignored("malformed payload");
        }
    };

    let job = match event::classify(&parsed, &state.bot_mention) {
        Ok(job) => job,
        Err(reason) => return ApiResponse::ignored(reason),
    };

    info!(
        "webhook: {} asked for a review of {}/{}#{} in {}'s voice",
        job.commenter, job.repo_owner, job.repo_name, job.pr_number, job.reviewer
    );

    // The commenter's OAuth token drives the whole job. Without one we can
    // only point them at the authorization flow, with the bot's own token.
    let token = match state.tokens.load(&job.commenter).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            post_auth_prompt(&state, &job).await;
            return ApiResponse::ignored("commenter has not authorized the app");
        }
        Err(e) => {
            warn!("webhook: token lookup failed for {}: {e}", job.commenter);
            return ApiResponse::ignored("token lookup failed");
        }
    };

    let accepted = WebhookAccepted {
        status: "accepted",
        reviewer: job.reviewer.clone(),
        pr_number: job.pr_number,
    };
    tokio::spawn(orchestrator::run_review_job(state, job, token));

    ApiResponse::success(accepted).into_response_with_status(StatusCode::OK)
}

/// Tells the commenter to authorize the app, via the bot's own identity.
/// Best effort: a failed prompt only loses the hint, not any state.
async fn post_auth_prompt(state: &AppState, job: &event::ReviewJob) {
    let login_url = format!("{}/auth/github/login", state.public_base_url);
    let body = format!(
        "Hi @{}! Before I can review on your behalf, please authorize the app: {login_url}",
        job.commenter
    );

    let github = match GitHubClient::new(
        state.github_api_base.clone(),
        state.github_bot_token.clone(),
        Duration::from_secs(state.http_timeout_secs),
    ) {
        Ok(github) => github,
        Err(e) => {
            warn!("webhook: cannot build bot client for auth prompt: {e}");
            return;
        }
    };
    let pr = PrLocator {
        owner: job.repo_owner.clone(),
        repo: job.repo_name.clone(),
        number: job.pr_number,
    };
    if let Err(e) = github.post_issue_comment(&pr, &body).await {
        warn!("webhook: auth prompt failed for {}: {e}", job.commenter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use voice_llm_service::VllmConfig;

    use crate::core::token_store::TokenStore;
    use crate::routes::webhook::dedup::DeliveryGuard;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            github_api_base: "http://localhost:1".into(),
            github_oauth_base: "http://localhost:1".into(),
            github_bot_token: "t".into(),
            github_client_id: "id".into(),
            github_client_secret: "secret".into(),
            public_base_url: "http://localhost:8080".into(),
            bot_mention: "@tech-lead-bot".into(),
            trainer_url: "http://localhost:1".into(),
            http_timeout_secs: 1,
            llm_config: VllmConfig {
                endpoint: "http://localhost:1".into(),
                base_model: "m".into(),
                max_tokens: None,
                temperature: None,
                top_p: None,
                timeout_secs: Some(1),
            },
            tokens: TokenStore::new(std::env::temp_dir().join("webhook-route-tests")),
            deliveries: DeliveryGuard::default(),
            http: reqwest::Client::new(),
        })
    }

    fn delivery_headers(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-GitHub-Event", HeaderValue::from_static("issue_comment"));
        headers.insert("X-GitHub-Delivery", HeaderValue::from_str(id).unwrap());
        headers
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // An "edited" comment never triggers a review, so this payload exercises
    // the filter path.
    const EDITED_PAYLOAD: &str = r#"{
        "action": "edited",
        "issue": {"number": 7, "pull_request": {"url": "https://api.github.com/repos/o/r/pulls/7"}},
        "comment": {"body": "@tech-lead-bot @octocat", "user": {"login": "alice"}},
        "repository": {"name": "widgets", "owner": {"login": "acme"}}
    }"#;

    #[tokio::test]
    async fn delivery_id_checked_before_classification() {
        let state = test_state();

        let first = webhook_route(
            State(state.clone()),
            delivery_headers("d-42"),
            Bytes::from_static(EDITED_PAYLOAD.as_bytes()),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);
        assert!(body_text(first).await.contains("comment action is not 'created'"));

        // The retry carries the same delivery id; the guard answers it even
        // though the first pass never got past the filter.
        let second = webhook_route(
            State(state),
            delivery_headers("d-42"),
            Bytes::from_static(EDITED_PAYLOAD.as_bytes()),
        )
        .await;
        assert_eq!(second.status(), StatusCode::OK);
        assert!(body_text(second).await.contains("duplicate delivery"));
    }

    #[tokio::test]
    async fn distinct_delivery_ids_both_processed() {
        let state = test_state();

        let first = webhook_route(
            State(state.clone()),
            delivery_headers("d-1"),
            Bytes::from_static(EDITED_PAYLOAD.as_bytes()),
        )
        .await;
        let second = webhook_route(
            State(state),
            delivery_headers("d-2"),
            Bytes::from_static(EDITED_PAYLOAD.as_bytes()),
        )
        .await;

        for resp in [first, second] {
            assert!(body_text(resp).await.contains("comment action is not 'created'"));
        }
    }
}
