//! OAuth connect handlers
//!
//! POST /auth/{provider} returns a consent URL; the frontend redirects the
//! user there and posts the returned code to POST /auth/{provider}/callback.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::AppState;
use crate::handlers::error_response;
use crate::models::auth::{AuthUrlRequest, AuthUrlResponse, OAuthCallbackRequest};
use crate::models::common::{ErrorResponse, MessageResponse};
use crate::services::oauth::OAuthProvider;

/// POST /auth/{provider}
pub async fn authorization_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(request): Json<AuthUrlRequest>,
) -> Result<Json<AuthUrlResponse>, (StatusCode, Json<ErrorResponse>)> {
    let provider: OAuthProvider = provider.parse().map_err(error_response)?;
    let auth_url = state
        .oauth
        .authorization_url(provider, request.user_id, &request.redirect_uri)
        .await
        .map_err(error_response)?;

    Ok(Json(AuthUrlResponse { auth_url }))
}

/// POST /auth/{provider}/callback
///
/// # Response
/// - 200: Tokens stored on the user
/// - 401: Unknown, expired or reused state; provider refused the code
/// - 404: Unknown provider or user
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(request): Json<OAuthCallbackRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let provider: OAuthProvider = provider.parse().map_err(error_response)?;
    let user_id = state
        .oauth
        .consume_state(provider, &request.state)
        .await
        .map_err(error_response)?;

    let tokens = state
        .oauth
        .exchange_code(provider, &request.code, &request.redirect_uri)
        .await
        .map_err(error_response)?;
    state
        .oauth
        .save_tokens(&state.db, user_id, provider, tokens)
        .await
        .map_err(error_response)?;

    info!(user_id = user_id, provider = %provider, "Connected OAuth account");
    Ok(Json(MessageResponse {
        message: format!("{} connected", provider),
    }))
}
