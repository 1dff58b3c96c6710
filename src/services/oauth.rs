//! OAuth connect flow for Notion and Google
//!
//! Authorization URLs carry a random single-use state token. The token maps
//! back to the requesting user in a TTL cache until the callback consumes it.

use moka::future::Cache;
use reqwest::{Client, Url};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::prelude::*;
use crate::models::auth::TokenResponse;
use crate::services::error::SyncError;

pub const NOTION_AUTHORIZE_URL: &str = "https://api.notion.com/v1/oauth/authorize";
pub const NOTION_TOKEN_URL: &str = "https://api.notion.com/v1/oauth/token";
pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Pending states expire after 10 minutes
pub const DEFAULT_STATE_TTL_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Notion,
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Notion => "notion",
            OAuthProvider::Google => "google",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notion" => Ok(OAuthProvider::Notion),
            "google" => Ok(OAuthProvider::Google),
            other => Err(SyncError::NotFound(format!("Unknown OAuth provider '{}'", other))),
        }
    }
}

/// Client credentials registered with each provider
#[derive(Debug, Clone, Default)]
pub struct OAuthClients {
    pub notion_client_id: String,
    pub notion_client_secret: String,
    pub google_client_id: String,
    pub google_client_secret: String,
}

#[derive(Clone)]
pub struct OAuthService {
    client: Client,
    clients: OAuthClients,
    states: Arc<Cache<String, (i32, OAuthProvider)>>,
}

impl OAuthService {
    pub fn new(clients: OAuthClients, state_ttl: Duration) -> Self {
        let states = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(state_ttl)
            .build();

        Self {
            client: Client::new(),
            clients,
            states: Arc::new(states),
        }
    }

    /// Build the provider's consent URL and remember the state for `user_id`
    pub async fn authorization_url(
        &self,
        provider: OAuthProvider,
        user_id: i32,
        redirect_uri: &str,
    ) -> Result<String, SyncError> {
        if redirect_uri.trim().is_empty() {
            return Err(SyncError::Validation("redirect_uri is required".to_string()));
        }

        let state = Uuid::new_v4().simple().to_string();
        let url = match provider {
            OAuthProvider::Notion => Url::parse_with_params(
                NOTION_AUTHORIZE_URL,
                &[
                    ("client_id", self.clients.notion_client_id.as_str()),
                    ("response_type", "code"),
                    ("owner", "user"),
                    ("redirect_uri", redirect_uri),
                    ("state", state.as_str()),
                ],
            ),
            OAuthProvider::Google => Url::parse_with_params(
                GOOGLE_AUTHORIZE_URL,
                &[
                    ("client_id", self.clients.google_client_id.as_str()),
                    ("response_type", "code"),
                    ("scope", GOOGLE_SHEETS_SCOPE),
                    ("redirect_uri", redirect_uri),
                    ("state", state.as_str()),
                    ("access_type", "offline"),
                    ("prompt", "consent"),
                ],
            ),
        }
        .map_err(|e| SyncError::Validation(format!("Invalid authorization URL: {}", e)))?;

        self.states.insert(state, (user_id, provider)).await;
        info!(user_id = user_id, provider = %provider, "Issued OAuth authorization URL");
        Ok(url.to_string())
    }

    /// Take the user a state was issued for. A state works once, and only
    /// for the provider that issued it.
    pub async fn consume_state(&self, provider: OAuthProvider, state: &str) -> Result<i32, SyncError> {
        match self.states.remove(state).await {
            Some((user_id, issued_for)) if issued_for == provider => Ok(user_id),
            Some((_, issued_for)) => {
                warn!(expected = %provider, actual = %issued_for, "OAuth state used with wrong provider");
                Err(SyncError::Auth("OAuth state does not match provider".to_string()))
            }
            None => Err(SyncError::Auth("Unknown or expired OAuth state".to_string())),
        }
    }

    /// Trade an authorization code for tokens
    pub async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, SyncError> {
        let request = match provider {
            OAuthProvider::Notion => self
                .client
                .post(NOTION_TOKEN_URL)
                .basic_auth(&self.clients.notion_client_id, Some(&self.clients.notion_client_secret))
                .form(&[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                ]),
            OAuthProvider::Google => self.client.post(GOOGLE_TOKEN_URL).form(&[
                ("client_id", self.clients.google_client_id.as_str()),
                ("client_secret", self.clients.google_client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ]),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_status(provider.as_str(), status, body));
        }

        Ok(response.json::<TokenResponse>().await?)
    }

    /// Store freshly issued tokens on the user
    pub async fn save_tokens(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
        provider: OAuthProvider,
        tokens: TokenResponse,
    ) -> Result<(), SyncError> {
        let user = Users::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("User {} not found", user_id)))?;

        let mut active = user.into_active_model();
        match provider {
            OAuthProvider::Notion => {
                active.notion_access_token = Set(Some(tokens.access_token));
                active.notion_refresh_token = Set(tokens.refresh_token);
            }
            OAuthProvider::Google => {
                active.google_access_token = Set(Some(tokens.access_token));
                // Google only returns a refresh token on first consent
                if tokens.refresh_token.is_some() {
                    active.google_refresh_token = Set(tokens.refresh_token);
                }
            }
        }
        active.updated_at = Set(chrono::Utc::now().fixed_offset());
        active.update(db).await?;

        info!(user_id = user_id, provider = %provider, "Stored OAuth tokens");
        Ok(())
    }
}
