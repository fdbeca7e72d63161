//! Authenticated Spotify Web API client
//!
//! The single chokepoint for upstream calls. Attaches the current access
//! token, and on a 401 performs exactly one refresh-and-retry before giving
//! up. Every other upstream failure propagates unchanged.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{TokenStore, request_token};
use crate::config::Config;
use crate::{Error, Result};

/// Authenticated client facade over the Spotify Web API
pub struct SpotifyClient {
    http: reqwest::Client,
    config: Config,
    tokens: Arc<TokenStore>,
}

impl SpotifyClient {
    /// Create a facade sharing the process-wide token store
    #[must_use]
    pub fn new(http: reqwest::Client, config: Config, tokens: Arc<TokenStore>) -> Self {
        Self {
            http,
            config,
            tokens,
        }
    }

    /// Shared token store (refreshes are visible to all holders)
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Perform an authorized request against the Web API.
    ///
    /// `path` is relative to the API base (e.g. `/me/playlists`). On a 401
    /// the stored refresh token is used once and the request retried once;
    /// if that also fails the authentication-expired error is what the
    /// caller sees.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        match self.send(method.clone(), path, query, body).await {
            Err(e) if e.is_auth_expired() => {
                debug!(path, "Access token rejected, attempting one refresh");
                match self.refresh().await {
                    Ok(()) => self.send(method, path, query, body).await,
                    Err(refresh_err) => {
                        // Propagate the original failure, not the refresh's
                        warn!(error = %refresh_err, "Token refresh failed");
                        Err(e)
                    }
                }
            }
            other => other,
        }
    }

    /// Fetch the current user's profile; used by the initializer as a
    /// connectivity smoke test.
    pub async fn current_user(&self) -> Result<Value> {
        self.request(Method::GET, "/me", &[], None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let access_token = self
            .tokens
            .get()
            .map(|c| c.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::AuthExpired("no access token available".to_string()))?;

        let mut request = self
            .http
            .request(method, format!("{}{path}", self.config.api_base()))
            .bearer_auth(access_token);

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_upstream(status.as_u16(), &body));
        }

        // Some write endpoints return 201/204 with an empty body
        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Last write wins when concurrent calls refresh at once; the grant is
    /// idempotent on the provider side and the store swap is atomic.
    async fn refresh(&self) -> Result<()> {
        let refresh_token = self
            .tokens
            .get()
            .and_then(|c| c.refresh_token)
            .ok_or_else(|| Error::AuthExpired("no refresh token available".to_string()))?;

        let token = request_token(
            &self.http,
            self.config.accounts_base(),
            &self.config.client_id,
            &self.config.client_secret,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
            ],
        )
        .await?;

        self.tokens
            .set(token.access_token, token.refresh_token, token.expires_in);
        info!("Refreshed Spotify access token");
        Ok(())
    }
}
