use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};

use crate::core::app_state::AppState;

/// Sends the user to the GitHub OAuth consent screen. The `repo` scope is
/// needed to read review history and post comments on their behalf.
pub async fn github_login_route(State(state): State<Arc<AppState>>) -> Response {
    let redirect_uri = format!("{}/auth/github/callback", state.public_base_url);
    let url = format!(
        "{}/login/oauth/authorize?client_id={}&scope=repo&redirect_uri={}",
        state.github_oauth_base,
        urlencoding::encode(&state.github_client_id),
        urlencoding::encode(&redirect_uri),
    );
    Redirect::temporary(&url).into_response()
}
