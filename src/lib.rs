//! Spotify MCP Server
//!
//! Exposes the Spotify Web API to AI agents over the Model Context Protocol
//! (stdio transport). The core is the OAuth token lifecycle: a browser-based
//! authorization-code flow with a loopback callback listener, in-memory
//! credential storage with transparent refresh, and an initialization gate
//! that keeps every tool behind a one-time `get_initial_context` handshake.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging.
///
/// Output goes to stderr: stdout carries the MCP protocol.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
