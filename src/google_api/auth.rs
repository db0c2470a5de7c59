//! OAuth2 browser consent flow for Google Calendar.
//!
//! Opens the user's browser for consent, captures the single redirect on a
//! localhost listener, verifies the `state` token, exchanges the auth code
//! for tokens and saves them. Every failure is returned to the caller; the
//! CLI decides whether to exit.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::{
    load_credentials, load_token, save_token, GoogleApiError, GoogleToken, InstalledAppCredentials,
    SCOPES,
};

/// Port the redirect listener binds. Must match a redirect URI registered
/// for the OAuth client.
pub const REDIRECT_PORT: u16 = 8888;

/// How long to wait for the browser redirect.
pub const REDIRECT_TIMEOUT_SECS: u64 = 120;

/// Load the saved token, or run the consent flow when there is none.
pub async fn ensure_authorized() -> Result<GoogleToken, GoogleApiError> {
    match load_token() {
        Ok(token) => Ok(token),
        Err(GoogleApiError::TokenNotFound(path)) => {
            log::info!("No Google token at {}; starting consent flow", path.display());
            run_consent_flow().await
        }
        Err(e) => Err(e),
    }
}

/// Run the full OAuth2 consent flow.
///
/// 1. Load credentials.json
/// 2. Bind the redirect listener
/// 3. Open browser with auth URL (and print it)
/// 4. Wait up to two minutes for exactly one redirect
/// 5. Exchange code for tokens and save them
pub async fn run_consent_flow() -> Result<GoogleToken, GoogleApiError> {
    let creds = load_credentials()?;
    let installed = &creds.installed;

    let listener = TcpListener::bind(("127.0.0.1", REDIRECT_PORT)).await?;
    let redirect_uri = format!("http://localhost:{}", REDIRECT_PORT);

    let state = generate_state();
    let auth_url = build_auth_url(installed, &redirect_uri, &state);

    println!("Go to the following link in your browser:\n{}", auth_url);
    if let Err(e) = open::that(&auth_url) {
        log::warn!("Failed to open browser: {}", e);
    }

    let auth_code = tokio::time::timeout(
        Duration::from_secs(REDIRECT_TIMEOUT_SECS),
        wait_for_auth_code(&listener, &state),
    )
    .await
    .map_err(|_| GoogleApiError::Timeout(REDIRECT_TIMEOUT_SECS))??;
    drop(listener);

    let token = exchange_code(installed, &auth_code, &redirect_uri).await?;
    save_token(&token)?;
    println!("Saving credential file to: {}", super::token_path().display());

    Ok(token)
}

/// 32 random bytes, URL-safe base64.
fn generate_state() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE.encode(bytes)
}

fn build_auth_url(installed: &InstalledAppCredentials, redirect_uri: &str, state: &str) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", &installed.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("access_type", "offline")
        .append_pair("state", state)
        .finish();
    format!("{}?{}", installed.auth_uri, query)
}

/// What a single request to the redirect listener turned out to be.
#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Code(String),
    Denied(String),
    StateMismatch,
    MissingCode,
    /// Not an OAuth redirect at all (e.g. a favicon request).
    Unrelated,
}

fn parse_redirect(request: &str, expected_state: &str) -> Redirect {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return Redirect::Unrelated;
    };

    let Ok(url) = url::Url::parse(&format!("http://localhost{}", target)) else {
        return Redirect::Unrelated;
    };

    let mut state = None;
    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "state" => state = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.is_none() && code.is_none() && error.is_none() {
        return Redirect::Unrelated;
    }
    if state.as_deref() != Some(expected_state) {
        return Redirect::StateMismatch;
    }
    if let Some(reason) = error {
        return Redirect::Denied(reason);
    }
    match code {
        Some(c) if !c.is_empty() => Redirect::Code(c),
        _ => Redirect::MissingCode,
    }
}

/// Accept connections until one of them is the OAuth redirect.
async fn wait_for_auth_code(listener: &TcpListener, state: &str) -> Result<String, GoogleApiError> {
    loop {
        let (mut stream, _) = listener.accept().await?;

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).await?;
        let request = String::from_utf8_lossy(&buffer[..n]);

        match parse_redirect(&request, state) {
            Redirect::Unrelated => {
                send_response(&mut stream, "404 Not Found", "Not found.").await;
            }
            Redirect::StateMismatch => {
                send_response(&mut stream, "400 Bad Request", "Error: Invalid state token.").await;
                return Err(GoogleApiError::OAuthStateMismatch);
            }
            Redirect::Denied(reason) => {
                send_response(&mut stream, "200 OK", "Authorization denied. You can close this window.")
                    .await;
                return Err(GoogleApiError::FlowCancelled(reason));
            }
            Redirect::MissingCode => {
                send_response(&mut stream, "400 Bad Request", "Error: No code found in the redirect.")
                    .await;
                return Err(GoogleApiError::FlowCancelled("no code in redirect".to_string()));
            }
            Redirect::Code(code) => {
                send_response(
                    &mut stream,
                    "200 OK",
                    "Authorization successful! You can close this window.",
                )
                .await;
                return Ok(code);
            }
        }
    }
}

async fn send_response(stream: &mut tokio::net::TcpStream, status: &str, message: &str) {
    let body = format!(
        "<html><body style=\"font-family: system-ui; text-align: center; padding: 40px;\">\
         <h2>{}</h2></body></html>",
        message
    );
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

async fn exchange_code(
    installed: &InstalledAppCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<GoogleToken, GoogleApiError> {
    let mut form = vec![
        ("code", code),
        ("client_id", installed.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    if let Some(secret) = installed.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let client = reqwest::Client::new();
    let resp = client.post(&installed.token_uri).form(&form).send().await?;

    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GoogleApiError::RefreshFailed(format!(
            "Token exchange failed: {}",
            body
        )));
    }

    let body: serde_json::Value = resp.json().await?;

    let access_token = body["access_token"]
        .as_str()
        .ok_or_else(|| GoogleApiError::RefreshFailed("No access_token in response".into()))?
        .to_string();
    let refresh_token = body["refresh_token"].as_str().map(|s| s.to_string());
    let expires_in = body["expires_in"].as_u64().unwrap_or(3600);
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64);

    Ok(GoogleToken {
        token: access_token,
        refresh_token,
        token_uri: installed.token_uri.clone(),
        client_id: installed.client_id.clone(),
        client_secret: installed.client_secret.clone(),
        scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        expiry: Some(expiry.to_rfc3339()),
    })
}
