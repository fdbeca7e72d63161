//! Browser authorization flow
//!
//! Builds the consent URL, runs a short-lived loopback HTTP listener for the
//! redirect, validates the anti-forgery state nonce, and exchanges the
//! authorization code for tokens. The listener is a scoped resource: it is
//! released on every exit path, so a failed flow never leaves the port bound.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use rand::RngExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::{TokenStore, request_token};
use crate::config::Config;
use crate::{Error, Result};

/// Permission scopes requested on every authorization (read/write on
/// profile, library, playlists, playback, and follow data).
pub const SCOPES: [&str; 17] = [
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-library-read",
    "user-library-modify",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
    "user-top-read",
    "user-follow-read",
    "user-follow-modify",
    "streaming",
    "app-remote-control",
];

/// Authorization flow controller
pub struct AuthFlow {
    http: reqwest::Client,
    config: Config,
    tokens: Arc<TokenStore>,
    // At most one callback listener per process; a second flow is rejected
    // while one is pending.
    in_flight: Arc<AsyncMutex<()>>,
}

/// Redirect query parameters from the authorization server
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// State shared with the callback handler
struct CallbackState {
    expected_state: String,
    redirect_uri: String,
    http: reqwest::Client,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    tokens: Arc<TokenStore>,
    result_tx: Mutex<Option<oneshot::Sender<Result<()>>>>,
}

/// A started flow: the listener is bound and waiting for the redirect
#[derive(Debug)]
pub struct PendingAuthorization {
    /// URL the user must visit to grant consent
    pub authorize_url: String,
    server: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    result_rx: Option<oneshot::Receiver<Result<()>>>,
    _permit: OwnedMutexGuard<()>,
}

impl AuthFlow {
    /// Create a flow controller over the shared token store
    #[must_use]
    pub fn new(http: reqwest::Client, config: Config, tokens: Arc<TokenStore>) -> Self {
        Self {
            http,
            config,
            tokens,
            in_flight: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Run the full flow: bind the listener, open the browser, wait for the
    /// callback, exchange the code, and populate the token store.
    ///
    /// Suspends until the user completes the browser interaction; callers
    /// may wrap the future in a timeout.
    pub async fn run(&self) -> Result<()> {
        let pending = self.start()?;

        if let Err(e) = open::that(&pending.authorize_url) {
            warn!(error = %e, "Failed to open browser automatically");
        }
        info!(url = %pending.authorize_url, "Waiting for authorization; visit this URL if the browser did not open");

        pending.finish().await
    }

    /// Bind the loopback listener and return the authorization URL without
    /// waiting for the callback. Fails fast on a non-loopback redirect and
    /// when another flow is already pending.
    pub fn start(&self) -> Result<PendingAuthorization> {
        let permit = self
            .in_flight
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::Authorization("an authorization flow is already in progress".to_string()))?;

        let target = self.config.redirect()?;
        let state_nonce = generate_state();
        let authorize_url = self.authorize_url(&state_nonce)?;

        let listener = std::net::TcpListener::bind((target.host.as_str(), target.port))
            .map_err(|e| {
            Error::Authorization(format!(
                "could not bind callback listener on {}:{}: {e}",
                target.host, target.port
            ))
        })?;
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;
        info!(host = %target.host, port = target.port, path = %target.path, "OAuth callback listener bound");

        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let callback_state = Arc::new(CallbackState {
            expected_state: state_nonce,
            redirect_uri: self.config.redirect_uri.clone(),
            http: self.http.clone(),
            accounts_base: self.config.accounts_base().to_string(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            tokens: Arc::clone(&self.tokens),
            result_tx: Mutex::new(Some(result_tx)),
        });

        // Only the redirect path is served; everything else is a 404 that
        // reveals nothing.
        let app = Router::new()
            .route(&target.path, get(handle_callback))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .with_state(callback_state);

        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                warn!(error = %e, "Callback listener error");
            }
        });

        Ok(PendingAuthorization {
            authorize_url,
            server: Some(server),
            shutdown_tx: Some(shutdown_tx),
            result_rx: Some(result_rx),
            _permit: permit,
        })
    }

    /// Build the browser-facing authorization URL
    fn authorize_url(&self, state_nonce: &str) -> Result<String> {
        let mut url = Url::parse(&format!("{}/authorize", self.config.accounts_base()))
            .map_err(|e| Error::Internal(format!("Invalid accounts base URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("state", state_nonce)
            // Force the consent screen even if previously approved
            .append_pair("show_dialog", "true");

        Ok(url.to_string())
    }
}

impl PendingAuthorization {
    /// Wait for the redirect, then tear the listener down. The port is free
    /// for rebinding by the time this returns, whatever the outcome.
    pub async fn finish(mut self) -> Result<()> {
        let result_rx = self
            .result_rx
            .take()
            .ok_or_else(|| Error::Internal("authorization flow already finished".to_string()))?;

        let outcome = result_rx
            .await
            .map_err(|_| Error::Authorization("callback listener closed unexpectedly".to_string()));

        // Graceful shutdown lets the in-flight response page reach the
        // browser before the port is released.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            let _ = server.await;
        }

        outcome?
    }
}

impl Drop for PendingAuthorization {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Handle the authorization redirect.
///
/// Check order matters: an explicit provider error first, then the state
/// nonce (mandatory, before any exchange), then the code.
async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    debug!(has_code = params.code.is_some(), has_error = params.error.is_some(), "Received OAuth callback");

    // The sender is claimed exactly once; a repeat callback cannot trigger
    // a second exchange.
    let Some(result_tx) = state.result_tx.lock().take() else {
        return Html(error_page("This authorization flow has already completed.")).into_response();
    };

    if let Some(error) = params.error {
        let _ = result_tx.send(Err(Error::Authorization(format!(
            "the authorization server returned an error: {error}"
        ))));
        return Html(error_page("Authorization was denied or failed.")).into_response();
    }

    if params.state.as_deref() != Some(state.expected_state.as_str()) {
        let _ = result_tx.send(Err(Error::Authorization("state mismatch".to_string())));
        return Html(error_page("State verification failed.")).into_response();
    }

    let Some(code) = params.code else {
        let _ = result_tx.send(Err(Error::Authorization(
            "no authorization code received".to_string(),
        )));
        return Html(error_page("No authorization code received.")).into_response();
    };

    match request_token(
        &state.http,
        &state.accounts_base,
        &state.client_id,
        &state.client_secret,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", &state.redirect_uri),
        ],
    )
    .await
    {
        Ok(token) => {
            state
                .tokens
                .set(token.access_token, token.refresh_token, token.expires_in);
            info!("Authorization code exchanged; credentials stored");
            let _ = result_tx.send(Ok(()));
            Html(success_page()).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Token exchange failed");
            let _ = result_tx.send(Err(e));
            Html(error_page("Failed to exchange the authorization code for tokens."))
                .into_response()
        }
    }
}

/// Generate the anti-forgery state nonce (16 random bytes, base64url)
fn generate_state() -> String {
    let state_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(state_bytes)
}

fn success_page() -> String {
    page(
        "Authorization Successful",
        "✓",
        "You can close this window and return to the Spotify MCP server.",
    )
}

fn error_page(description: &str) -> String {
    page("Authorization Failed", "✗", description)
}

// Minimal acknowledgment pages; no nonce or token ever appears here.
fn page(title: &str, mark: &str, description: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
        }}
        .container {{ text-align: center; padding: 2rem; }}
        .mark {{ font-size: 4rem; margin-bottom: 1rem; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="mark">{mark}</div>
        <h1>{title}</h1>
        <p>{description}</p>
    </div>
    <script>setTimeout(() => window.close(), 3000);</script>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(redirect_uri: &str) -> AuthFlow {
        let config = Config {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: redirect_uri.to_string(),
            ..Config::default()
        };
        AuthFlow::new(reqwest::Client::new(), config, Arc::new(TokenStore::new()))
    }

    #[test]
    fn state_is_base64url_safe_and_long_enough() {
        for _ in 0..10 {
            let state = generate_state();
            assert!(!state.contains('+'));
            assert!(!state.contains('/'));
            assert!(!state.contains('='));
            // 16 random bytes -> 22 base64url chars
            assert!(state.len() >= 20);
        }
    }

    #[test]
    fn state_generates_unique_values() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn authorize_url_carries_the_required_params() {
        let flow = flow("http://127.0.0.1:8000/callback");
        let url = Url::parse(&flow.authorize_url("nonce123").unwrap()).unwrap();

        assert!(url.as_str().starts_with("https://accounts.spotify.com/authorize?"));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-id");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8000/callback");
        assert_eq!(pairs["state"], "nonce123");
        assert_eq!(pairs["show_dialog"], "true");
        assert_eq!(pairs["scope"], SCOPES.join(" "));
    }

    #[test]
    fn scope_set_covers_playlists_and_playback() {
        assert!(SCOPES.contains(&"playlist-modify-private"));
        assert!(SCOPES.contains(&"user-modify-playback-state"));
        assert!(SCOPES.contains(&"user-follow-modify"));
        assert_eq!(SCOPES.len(), 17);
    }

    #[tokio::test]
    async fn non_loopback_redirect_fails_before_binding() {
        let flow = flow("https://evil.example.com/callback");
        let err = flow.start().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn second_flow_while_pending_is_rejected() {
        let flow = flow("http://127.0.0.1:0/callback");
        // Port 0 binds an ephemeral port, good enough to hold the permit
        let pending = flow.start().unwrap();

        let err = flow.start().unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
        assert!(err.to_string().contains("already in progress"));

        drop(pending);
    }
}
