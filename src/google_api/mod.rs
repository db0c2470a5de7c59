//! Native Google API client.
//!
//! Direct HTTP via reqwest; no Google SDK. Token files written by the
//! standard Go/Python OAuth libraries (`access_token` / `token` keys) are
//! accepted on read.
//!
//! Modules:
//! - auth: OAuth2 browser consent flow with a localhost callback listener
//! - calendar: Google Calendar API v3 event listing + event-type filter
//! - token_store: token.json persistence

pub mod auth;
pub mod calendar;
pub mod token_store;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Read-only calendar access is all the planner needs.
pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar.readonly"];

// ============================================================================
// Token types
// ============================================================================

/// OAuth2 token payload persisted in token.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleToken {
    /// The access token (written as "token"; "access_token" accepted on read)
    #[serde(alias = "access_token")]
    pub token: String,
    /// The refresh token (long-lived, used to get new access tokens)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token endpoint URL
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// OAuth2 client ID. Empty for tokens written by other tools; filled
    /// from credentials.json on refresh.
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Token expiry time (RFC 3339)
    #[serde(default)]
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth2 client credentials from credentials.json (Desktop App type).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub installed: InstalledAppCredentials,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledAppCredentials {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GoogleApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token expired or revoked")]
    AuthExpired,
    #[error("Credentials not found at {0}")]
    CredentialsNotFound(PathBuf),
    #[error("Token not found at {0}")]
    TokenNotFound(PathBuf),
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("OAuth flow cancelled: {0}")]
    FlowCancelled(String),
    #[error("Invalid credentials format: {0}")]
    InvalidCredentials(String),
    #[error("OAuth state mismatch")]
    OAuthStateMismatch,
    #[error("Timed out after {0} seconds waiting for the OAuth redirect")]
    Timeout(u64),
}

// ============================================================================
// Paths
// ============================================================================

fn google_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".obsidian-planner")
        .join("google")
}

pub fn token_path() -> PathBuf {
    google_dir().join("token.json")
}

/// Canonical path to the OAuth client credentials file.
pub fn credentials_path() -> PathBuf {
    google_dir().join("credentials.json")
}

/// Load token from storage.
pub fn load_token() -> Result<GoogleToken, GoogleApiError> {
    token_store::load_token_from(&token_path())
}

/// Save token to storage.
pub fn save_token(token: &GoogleToken) -> Result<(), GoogleApiError> {
    token_store::save_token_to(&token_path(), token)
}

/// Load client credentials.
///
/// Resolution order:
/// 1. ~/.obsidian-planner/google/credentials.json
/// 2. ./credentials.json (working directory)
pub fn load_credentials() -> Result<ClientCredentials, GoogleApiError> {
    let primary = credentials_path();
    if primary.exists() {
        return load_credentials_from(&primary);
    }

    let local = PathBuf::from("credentials.json");
    if local.exists() {
        return load_credentials_from(&local);
    }

    Err(GoogleApiError::CredentialsNotFound(primary))
}

pub fn load_credentials_from(path: &Path) -> Result<ClientCredentials, GoogleApiError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| GoogleApiError::InvalidCredentials(format!("{}: {}", path.display(), e)))
}

// ============================================================================
// Token refresh
// ============================================================================

/// Check if a token is expired based on its expiry field.
pub fn is_token_expired(token: &GoogleToken) -> bool {
    match &token.expiry {
        None => true, // No expiry = assume expired, try refresh
        Some(expiry_str) => match chrono::DateTime::parse_from_rfc3339(expiry_str) {
            Ok(expiry) => {
                // Consider expired if within 60 seconds of expiry
                let now = chrono::Utc::now();
                expiry <= now + chrono::Duration::seconds(60)
            }
            Err(_) => true,
        },
    }
}

/// Refresh an access token using the refresh token.
///
/// Returns an updated GoogleToken with new access token and expiry, and
/// persists it.
pub async fn refresh_access_token(token: &GoogleToken) -> Result<GoogleToken, GoogleApiError> {
    let refresh_token = token
        .refresh_token
        .as_ref()
        .ok_or(GoogleApiError::AuthExpired)?;

    let mut token = token.clone();
    if token.client_id.is_empty() {
        let creds = load_credentials()?;
        token.client_id = creds.installed.client_id;
        token.client_secret = creds.installed.client_secret;
        token.token_uri = creds.installed.token_uri;
    }

    let mut form = vec![
        ("client_id", token.client_id.as_str()),
        ("refresh_token", refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];
    if let Some(secret) = token.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let client = reqwest::Client::new();
    let resp = client.post(&token.token_uri).form(&form).send().await?;
    let status = resp.status();
    let body_text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(map_refresh_error(status.as_u16(), &body_text));
    }

    let body: serde_json::Value = serde_json::from_str(&body_text)?;
    let access_token = body["access_token"]
        .as_str()
        .ok_or_else(|| GoogleApiError::RefreshFailed("No access_token in response".into()))?;
    let expires_in = body["expires_in"].as_u64().unwrap_or(3600);
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64);

    token.token = access_token.to_string();
    token.expiry = Some(expiry.to_rfc3339());

    save_token(&token)?;
    log::info!("Refreshed Google access token (expires {})", expiry.to_rfc3339());

    Ok(token)
}

fn map_refresh_error(status: u16, body: &str) -> GoogleApiError {
    let lowered = body.to_lowercase();
    if (status == 400 || status == 401)
        && (lowered.contains("invalid_grant") || lowered.contains("token has been expired"))
    {
        return GoogleApiError::AuthExpired;
    }
    GoogleApiError::RefreshFailed(format!("HTTP {}: {}", status, body))
}

/// Get a valid access token, refreshing if expired.
pub async fn get_valid_access_token() -> Result<String, GoogleApiError> {
    let token = load_token()?;

    if is_token_expired(&token) {
        let refreshed = refresh_access_token(&token).await?;
        Ok(refreshed.token)
    } else {
        Ok(token.token)
    }
}

// ============================================================================
// Tests
// ============================================================================
