//! OAuth 2.0 authorization for the Spotify Web API
//!
//! Implements the Authorization Code flow against the Spotify accounts
//! service: browser-based consent, a loopback callback listener with CSRF
//! state validation, code-for-token exchange, and in-memory token storage.

mod flow;
mod tokens;

pub use flow::{AuthFlow, PendingAuthorization, SCOPES};
pub use tokens::{Credentials, TokenStore};

use serde::Deserialize;

use crate::{Error, Result};

/// Token endpoint response (authorization-code and refresh grants)
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// POST a grant to the accounts token endpoint with client-secret Basic auth.
///
/// Used by the flow (`grant_type=authorization_code`) and by the client
/// facade (`grant_type=refresh_token`).
pub(crate) async fn request_token(
    http: &reqwest::Client,
    accounts_base: &str,
    client_id: &str,
    client_secret: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(format!("{accounts_base}/api/token"))
        .basic_auth(client_id, Some(client_secret))
        .form(params)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Authorization(format!(
            "token endpoint rejected the request (HTTP {}): {}",
            status.as_u16(),
            token_error_message(&body)
        )));
    }

    Ok(response.json().await?)
}

/// Extract `error_description` (or `error`) from an accounts-service error
/// body, falling back to the raw body.
fn token_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error_description")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
