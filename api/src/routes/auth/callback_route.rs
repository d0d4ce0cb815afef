use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};
use crate::error_handler::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

#[derive(Serialize)]
struct Authorized {
    status: &'static str,
    username: String,
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct AuthenticatedUser {
    login: String,
}

/// OAuth callback: exchanges the code for an access token, resolves the
/// username it belongs to, and persists the token for later webhook runs.
#[instrument(name = "github_callback_route", skip(state, query))]
pub async fn github_callback_route(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match authorize(&state, &query.code).await {
        Ok(username) => {
            info!("auth: stored token for {username}");
            ApiResponse::success(Authorized {
                status: "success",
                username,
            })
            .into_response_with_status(StatusCode::OK)
        }
        Err(e) => {
            warn!("auth: callback failed: {e}");
            e.into_response()
        }
    }
}

async fn authorize(state: &AppState, code: &str) -> AppResult<String> {
    let exchange_url = format!("{}/login/oauth/access_token", state.github_oauth_base);
    let resp = state
        .http
        .post(&exchange_url)
        .header("Accept", "application/json")
        .form(&ExchangeRequest {
            client_id: &state.github_client_id,
            client_secret: &state.github_client_secret,
            code,
        })
        .send()
        .await
        .map_err(|e| AppError::OAuthExchange(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(AppError::OAuthExchange(format!(
            "token exchange returned {}",
            resp.status()
        )));
    }
    let exchange: ExchangeResponse = resp
        .json()
        .await
        .map_err(|e| AppError::OAuthExchange(e.to_string()))?;
    let Some(access_token) = exchange.access_token else {
        return Err(AppError::BadRequest("no access token returned".into()));
    };

    // Whose token is this? Ask the API with the token itself.
    let user: AuthenticatedUser = state
        .http
        .get(format!("{}/user", state.github_api_base))
        .header("Authorization", format!("token {access_token}"))
        .header("Accept", "application/vnd.github.v3+json")
        .send()
        .await
        .map_err(|e| AppError::OAuthExchange(e.to_string()))?
        .error_for_status()
        .map_err(|e| AppError::OAuthExchange(e.to_string()))?
        .json()
        .await
        .map_err(|e| AppError::OAuthExchange(e.to_string()))?;

    state.tokens.store(&user.login, &access_token).await?;
    Ok(user.login)
}
