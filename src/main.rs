//! Spotify MCP server binary

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use spotify_mcp::{
    auth::{AuthFlow, TokenStore},
    cli::Cli,
    client::SpotifyClient,
    config::Config,
    gate::InitGate,
    server::McpServer,
    setup_tracing,
    tools::{ToolContext, ToolRegistry},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenStore::from_config(&config));
    let flow = AuthFlow::new(http.clone(), config.clone(), Arc::clone(&tokens));

    // Standalone authorization mode: run the flow and print nothing but logs
    if cli.authorize {
        if let Err(e) = config.validate() {
            error!(error = %e, "Configuration invalid");
            return ExitCode::FAILURE;
        }
        return match flow.run().await {
            Ok(()) => {
                eprintln!("Authorization complete. Tokens are held in memory for this process;");
                eprintln!("run the server without --authorize to use them via get_initial_context.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Authorization failed");
                ExitCode::FAILURE
            }
        };
    }

    let ctx = ToolContext {
        client: SpotifyClient::new(http, config.clone(), Arc::clone(&tokens)),
        flow,
        gate: Arc::new(InitGate::new()),
        config,
    };

    let server = McpServer::new(ToolRegistry::new(ctx));
    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
