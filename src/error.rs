//! Error types for the Spotify MCP server

use std::io;

use thiserror::Error;

/// Result type alias for the Spotify MCP server
pub type Result<T> = std::result::Result<T, Error>;

/// Spotify MCP server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing credentials, bad redirect URI)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tool was invoked before `get_initial_context` opened the gate
    #[error(
        "Spotify initial context has not been retrieved. Call the get_initial_context tool \
         first to initialize your Spotify connection and get usage instructions."
    )]
    NotInitialized,

    /// Authorization flow failure (consent denied, state mismatch, missing
    /// code, exchange rejection). Retryable by calling the initializer again.
    #[error("Authorization failed: {0}. Call get_initial_context again to retry.")]
    Authorization(String),

    /// Upstream rejected the access token and the one refresh-and-retry
    /// could not recover
    #[error("Spotify authentication expired: {0}")]
    AuthExpired(String),

    /// Upstream domain error (not-found, permission, validation, rate limit)
    #[error("Spotify API error (HTTP {status}): {message}")]
    Upstream {
        /// HTTP status from the Spotify Web API
        status: u16,
        /// Upstream error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an upstream error from a status code and body, unwrapping
    /// Spotify's `{"error": {"status", "message"}}` envelope when present.
    #[must_use]
    pub fn from_upstream(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| body.to_string());

        if status == 401 {
            Self::AuthExpired(message)
        } else {
            Self::Upstream { status, message }
        }
    }

    /// True for errors the facade may recover from with a token refresh.
    /// Classified by the explicit status code, never by message text.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::Json(_) => -32700, // Parse error
            Self::NotInitialized => -32002,
            Self::Config(_) => -32001,
            Self::Authorization(_) | Self::AuthExpired(_) => -32000,
            _ => -32603, // Internal error
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
}
