use voice_llm_service::VllmConfig;

use crate::core::token_store::TokenStore;
use crate::error_handler::AppError;
use crate::routes::webhook::dedup::DeliveryGuard;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// API base for GitHub, e.g. "https://api.github.com".
    pub github_api_base: String,
    /// Base for the OAuth web flow (overridable for tests).
    pub github_oauth_base: String,
    /// Bot-account token, used for comments on behalf of the bot itself
    /// (authorization prompts) before a user token exists.
    pub github_bot_token: String,
    /// OAuth app credentials for the authorization flow.
    pub github_client_id: String,
    pub github_client_secret: String,
    /// Externally reachable base URL of this service, used in OAuth links.
    pub public_base_url: String,
    /// Mention that wakes the bot up in PR comments.
    pub bot_mention: String,
    /// Base URL of the fine-tuning service.
    pub trainer_url: String,
    /// Timeout for one GitHub API call.
    pub http_timeout_secs: u64,
    /// Configuration of the vLLM serving endpoint.
    pub llm_config: VllmConfig,
    /// Per-user OAuth token storage.
    pub tokens: TokenStore,
    /// Webhook delivery dedup guard.
    pub deliveries: DeliveryGuard,
    /// Client for the OAuth exchange (GitHub API calls use their own client
    /// carrying the per-user token).
    pub http: reqwest::Client,
}

impl AppState {
    /// Load shared state from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent("pr-voice-backend/0.1")
            .build()
            .map_err(|e| AppError::BadRequest(format!("http client init failed: {e}")))?;

        Ok(Self {
            github_api_base: std::env::var("GITHUB_API_BASE")
                .unwrap_or_else(|_| "https://api.github.com".into()),
            github_oauth_base: std::env::var("GITHUB_OAUTH_BASE")
                .unwrap_or_else(|_| "https://github.com".into()),
            github_bot_token: std::env::var("GITHUB_TOKEN")
                .map_err(|_| AppError::MissingEnv("GITHUB_TOKEN"))?,
            github_client_id: std::env::var("GITHUB_CLIENT_ID")
                .map_err(|_| AppError::MissingEnv("GITHUB_CLIENT_ID"))?,
            github_client_secret: std::env::var("GITHUB_CLIENT_SECRET")
                .map_err(|_| AppError::MissingEnv("GITHUB_CLIENT_SECRET"))?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            bot_mention: std::env::var("BOT_MENTION")
                .unwrap_or_else(|_| "@tech-lead-bot".into()),
            trainer_url: std::env::var("TRAINER_URL")
                .unwrap_or_else(|_| "http://localhost:8500".into()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            llm_config: VllmConfig::from_env(),
            tokens: TokenStore::from_env(),
            deliveries: DeliveryGuard::default(),
            http,
        })
    }
}
