//! Command-line interface

use clap::Parser;

/// Spotify MCP server - stdio Model Context Protocol server for the Spotify Web API
#[derive(Parser, Debug)]
#[command(name = "spotify-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SPOTIFY_MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "SPOTIFY_MCP_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Run the authorization flow and exit instead of serving
    #[arg(long)]
    pub authorize: bool,
}
