//! Configuration management
//!
//! All settings come from `SPOTIFY_*` environment variables (optionally via a
//! `.env` file). Client ID, secret, and redirect URI are required; access and
//! refresh tokens are optional — when absent, the first `get_initial_context`
//! call routes through the browser authorization flow instead.

use figment::{Figment, providers::Env};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default Spotify accounts service (authorize + token endpoints)
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// Default Spotify Web API base
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    /// Spotify application client ID
    pub client_id: String,

    /// Spotify application client secret
    pub client_secret: String,

    /// OAuth redirect URI; must resolve to a loopback address
    pub redirect_uri: String,

    /// Pre-provisioned access token (skips the browser flow when valid)
    pub api_token: Option<String>,

    /// Pre-provisioned refresh token
    pub refresh_token: Option<String>,

    /// Accounts service base URL (overridable for tests)
    pub accounts_base_url: Option<String>,

    /// Web API base URL (overridable for tests)
    pub api_base_url: Option<String>,
}

/// Parsed loopback redirect target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Loopback host (`localhost` or `127.0.0.1`)
    pub host: String,
    /// Port to bind the callback listener on
    pub port: u16,
    /// Path the authorization server redirects to
    pub path: String,
}

impl Config {
    /// Load configuration from `SPOTIFY_*` environment variables.
    ///
    /// Loads `.env` first (ignored if absent) so the variables behave the
    /// same whether exported or file-provided.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Figment::new()
            .merge(Env::prefixed("SPOTIFY_"))
            .extract()
            .map_err(|e| Error::Config(format!("Failed to read environment: {e}")))
    }

    /// Validate required credentials. Absence of the optional tokens is not
    /// an error; it only means the authorization flow runs on first use.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.client_id.is_empty() {
            missing.push("SPOTIFY_CLIENT_ID");
        }
        if self.client_secret.is_empty() {
            missing.push("SPOTIFY_CLIENT_SECRET");
        }
        if self.redirect_uri.is_empty() {
            missing.push("SPOTIFY_REDIRECT_URI");
        }

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required environment variables: {}.\n\
                 1. Go to the Spotify Developer Dashboard: https://developer.spotify.com/dashboard/applications\n\
                 2. Create an application (or use an existing one)\n\
                 3. Set the Redirect URI to: http://127.0.0.1:8000/callback\n\
                 4. Export SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REDIRECT_URI",
                missing.join(", ")
            )));
        }

        // Fail fast on a non-loopback redirect before anything binds a port
        self.redirect()?;
        Ok(())
    }

    /// Parse the redirect URI into a bindable loopback target.
    ///
    /// The code exchange trusts whoever can bind this port, which is only a
    /// safe assumption on loopback, so any other host is a hard error.
    pub fn redirect(&self) -> Result<RedirectTarget> {
        let url = Url::parse(&self.redirect_uri)
            .map_err(|e| Error::Config(format!("Invalid SPOTIFY_REDIRECT_URI: {e}")))?;

        let host = url
            .host_str()
            .ok_or_else(|| Error::Config("SPOTIFY_REDIRECT_URI has no host".to_string()))?;

        if host != "localhost" && host != "127.0.0.1" {
            return Err(Error::Config(format!(
                "Redirect URI must use a loopback host for automatic token exchange, got \"{host}\". \
                 Update SPOTIFY_REDIRECT_URI to something like http://127.0.0.1:8000/callback"
            )));
        }

        Ok(RedirectTarget {
            host: host.to_string(),
            port: url.port().unwrap_or(8000),
            path: match url.path() {
                "" | "/" => "/callback".to_string(),
                p => p.to_string(),
            },
        })
    }

    /// Accounts service base URL
    #[must_use]
    pub fn accounts_base(&self) -> &str {
        self.accounts_base_url
            .as_deref()
            .unwrap_or(DEFAULT_ACCOUNTS_BASE_URL)
    }

    /// Web API base URL
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    /// Redacted summary for the initial context (never exposes token values)
    #[must_use]
    pub fn summary(&self) -> String {
        let yes_no = |b: bool| if b { "Configured" } else { "Missing" };
        format!(
            "Current Spotify Configuration:\n\
             - Client ID: {}\n\
             - Client Secret: {}\n\
             - Access Token: {}\n\
             - Refresh Token: {}\n\
             - Redirect URI: {}",
            yes_no(!self.client_id.is_empty()),
            yes_no(!self.client_secret.is_empty()),
            yes_no(self.api_token.is_some()),
            yes_no(self.refresh_token.is_some()),
            self.redirect_uri
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://127.0.0.1:8000/callback".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_credentials_are_named_in_the_error() {
        let config = Config {
            redirect_uri: "http://127.0.0.1:8000/callback".to_string(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SPOTIFY_CLIENT_ID"));
        assert!(msg.contains("SPOTIFY_CLIENT_SECRET"));
    }

    #[test]
    fn redirect_parses_host_port_path() {
        let target = valid_config().redirect().unwrap();
        assert_eq!(
            target,
            RedirectTarget {
                host: "127.0.0.1".to_string(),
                port: 8000,
                path: "/callback".to_string(),
            }
        );
    }

    #[test]
    fn localhost_is_accepted() {
        let mut config = valid_config();
        config.redirect_uri = "http://localhost:9090/cb".to_string();
        let target = config.redirect().unwrap();
        assert_eq!(target.host, "localhost");
        assert_eq!(target.port, 9090);
        assert_eq!(target.path, "/cb");
    }

    #[test]
    fn non_loopback_host_is_rejected() {
        let mut config = valid_config();
        config.redirect_uri = "https://example.com/callback".to_string();
        let err = config.redirect().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("loopback"));
    }

    #[test]
    fn private_network_host_is_rejected() {
        let mut config = valid_config();
        config.redirect_uri = "http://192.168.1.10:8000/callback".to_string();
        assert!(config.redirect().is_err());
    }

    #[test]
    fn default_port_and_path_are_applied() {
        let mut config = valid_config();
        config.redirect_uri = "http://127.0.0.1".to_string();
        let target = config.redirect().unwrap();
        assert_eq!(target.port, 8000);
        assert_eq!(target.path, "/callback");
    }

    #[test]
    fn summary_never_contains_token_values() {
        let mut config = valid_config();
        config.api_token = Some("super-secret-access".to_string());
        config.refresh_token = Some("super-secret-refresh".to_string());
        let summary = config.summary();
        assert!(!summary.contains("super-secret-access"));
        assert!(!summary.contains("super-secret-refresh"));
        assert!(summary.contains("Access Token: Configured"));
    }
}
