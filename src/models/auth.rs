//! OAuth request/response models

use serde::{Deserialize, Serialize};

/// POST /auth/{provider}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUrlRequest {
    pub user_id: i32,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

/// POST /auth/{provider}/callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCallbackRequest {
    pub code: String,
    pub state: String,
    pub redirect_uri: String,
}

/// Token endpoint response (Notion and Google share these fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
