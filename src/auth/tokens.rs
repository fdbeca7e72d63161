//! Credential store
//!
//! Holds the current access/refresh token pair in memory. Shared via `Arc`
//! so the authorization flow and the client facade observe every refresh
//! immediately. Tokens are never persisted to disk by this crate.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::config::Config;

/// Tokens are treated as expired this many seconds before the actual expiry
/// so an in-flight request does not race the deadline.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// A snapshot of the current OAuth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer access token
    pub access_token: String,
    /// Refresh token, if the provider issued one
    pub refresh_token: Option<String>,
    /// Absolute expiry (Unix seconds); `None` means no known expiry
    pub expires_at: Option<u64>,
}

impl Credentials {
    /// Check if the access token is past (or within the margin of) expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_unix() + EXPIRY_MARGIN_SECS >= expires_at,
            // No expiry known: assume usable until upstream says otherwise
            None => false,
        }
    }
}

/// In-memory store for the process-wide Spotify credentials
#[derive(Debug, Default)]
pub struct TokenStore {
    current: RwLock<Option<Credentials>>,
}

impl TokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with any pre-provisioned tokens from config.
    /// Env-provided tokens carry no expiry; upstream 401s drive refresh.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let store = Self::new();
        if config.api_token.is_some() || config.refresh_token.is_some() {
            *store.current.write() = Some(Credentials {
                access_token: config.api_token.clone().unwrap_or_default(),
                refresh_token: config.refresh_token.clone(),
                expires_at: None,
            });
        }
        store
    }

    /// Current credentials, if any
    #[must_use]
    pub fn get(&self) -> Option<Credentials> {
        self.current.read().clone()
    }

    /// Overwrite the stored credentials.
    ///
    /// `refresh_token: None` keeps the previous refresh token — Spotify only
    /// returns a new one when it rotates it.
    pub fn set(&self, access_token: String, refresh_token: Option<String>, expires_in: Option<u64>) {
        let mut current = self.current.write();
        let refresh_token =
            refresh_token.or_else(|| current.as_ref().and_then(|c| c.refresh_token.clone()));
        *current = Some(Credentials {
            access_token,
            refresh_token,
            expires_at: expires_in.map(|secs| now_unix() + secs),
        });
    }

    /// True if a call can be attempted: a non-expired access token exists,
    /// or a refresh token exists as fallback.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        match &*self.current.read() {
            Some(c) => {
                (!c.access_token.is_empty() && !c.is_expired()) || c.refresh_token.is_some()
            }
            None => false,
        }
    }

    /// Drop all credentials (test isolation)
    pub fn clear(&self) {
        *self.current.write() = None;
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_is_not_usable() {
        assert!(!TokenStore::new().is_usable());
        assert!(TokenStore::new().get().is_none());
    }

    #[test]
    fn set_computes_absolute_expiry() {
        let store = TokenStore::new();
        store.set("access".to_string(), Some("refresh".to_string()), Some(3600));

        let creds = store.get().unwrap();
        assert_eq!(creds.access_token, "access");
        assert_eq!(creds.refresh_token.as_deref(), Some("refresh"));
        let expires_at = creds.expires_at.unwrap();
        assert!(expires_at > now_unix() + 3000);
        assert!(!creds.is_expired());
        assert!(store.is_usable());
    }

    #[test]
    fn expired_token_without_refresh_is_unusable() {
        let store = TokenStore::new();
        store.set("access".to_string(), None, Some(0));
        assert!(store.get().unwrap().is_expired());
        assert!(!store.is_usable());
    }

    #[test]
    fn expired_token_with_refresh_is_usable() {
        let store = TokenStore::new();
        store.set("access".to_string(), Some("refresh".to_string()), Some(0));
        assert!(store.is_usable());
    }

    #[test]
    fn token_within_expiry_margin_counts_as_expired() {
        let store = TokenStore::new();
        store.set("access".to_string(), None, Some(30));
        assert!(store.get().unwrap().is_expired());
    }

    #[test]
    fn token_without_expiry_does_not_expire() {
        let store = TokenStore::new();
        store.set("access".to_string(), None, None);
        assert!(!store.get().unwrap().is_expired());
        assert!(store.is_usable());
    }

    #[test]
    fn refresh_token_survives_a_rotationless_refresh() {
        let store = TokenStore::new();
        store.set("first".to_string(), Some("keep-me".to_string()), Some(3600));
        store.set("second".to_string(), None, Some(3600));

        let creds = store.get().unwrap();
        assert_eq!(creds.access_token, "second");
        assert_eq!(creds.refresh_token.as_deref(), Some("keep-me"));
    }

    #[test]
    fn rotated_refresh_token_replaces_the_old_one() {
        let store = TokenStore::new();
        store.set("first".to_string(), Some("old".to_string()), Some(3600));
        store.set("second".to_string(), Some("new".to_string()), Some(3600));
        assert_eq!(store.get().unwrap().refresh_token.as_deref(), Some("new"));
    }

    #[test]
    fn store_seeds_from_config_tokens() {
        let config = Config {
            api_token: Some("env-access".to_string()),
            refresh_token: Some("env-refresh".to_string()),
            ..Config::default()
        };
        let store = TokenStore::from_config(&config);
        let creds = store.get().unwrap();
        assert_eq!(creds.access_token, "env-access");
        assert_eq!(creds.refresh_token.as_deref(), Some("env-refresh"));
        assert!(creds.expires_at.is_none());
        assert!(store.is_usable());
    }

    #[test]
    fn refresh_token_alone_is_enough() {
        let config = Config {
            refresh_token: Some("env-refresh".to_string()),
            ..Config::default()
        };
        assert!(TokenStore::from_config(&config).is_usable());
    }

    #[test]
    fn clear_empties_the_store() {
        let store = TokenStore::new();
        store.set("access".to_string(), None, None);
        store.clear();
        assert!(!store.is_usable());
    }
}
