//! The `get_initial_context` initializer
//!
//! The only tool that passes the gate while it is closed, and the only thing
//! that opens it. Validates configuration, runs the browser authorization
//! flow when the stored credentials are unusable, smoke-tests connectivity,
//! and returns the usage instructions plus a context summary.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::instructions::MCP_INSTRUCTIONS;
use super::{ToolContext, ToolHandler};
use crate::gate::INITIALIZER_TOOL;
use crate::protocol::{Tool, ToolsCallResult};
use crate::Result;

/// Initializer tool
pub struct GetInitialContext;

#[async_trait]
impl ToolHandler for GetInitialContext {
    fn definition(&self) -> Tool {
        Tool {
            name: INITIALIZER_TOOL.to_string(),
            description: Some(
                "Initialize the Spotify connection and retrieve usage instructions. \
                 Must be called before any other tool."
                    .to_string(),
            ),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, ctx: &ToolContext, _args: Value) -> Result<ToolsCallResult> {
        // Configuration problems surface with remediation steps and leave
        // the gate closed.
        ctx.config.validate()?;

        // Unusable credentials route through the browser flow; a failure
        // here is retryable by calling this tool again.
        if !ctx.client.tokens().is_usable() {
            info!("No usable credentials; starting authorization flow");
            ctx.flow.run().await?;
        }

        // Connectivity smoke test through the facade (which performs the
        // one refresh-and-retry if the token just expired).
        let me = ctx.client.current_user().await?;

        let user_info = format!(
            "Current Spotify User:\n\
             - Display Name: {}\n\
             - User ID: {}\n\
             - Country: {}\n\
             - Subscription: {}\n\
             - Followers: {}",
            me["display_name"].as_str().unwrap_or("Not available"),
            me["id"].as_str().unwrap_or("Unknown"),
            me["country"].as_str().unwrap_or("Not specified"),
            me["product"].as_str().unwrap_or("Not specified"),
            me.pointer("/followers/total").and_then(Value::as_u64).unwrap_or(0),
        );

        let message = format!(
            "{MCP_INSTRUCTIONS}\n\n\
             This is the initial context for your Spotify integration:\n\n\
             <context>\n{}\n\n{user_info}\n</context>\n\n\
             <todaysDate>{}</todaysDate>",
            ctx.config.summary(),
            Utc::now().format("%Y-%m-%d"),
        );

        // Everything checked out; open the gate for the rest of the tools.
        ctx.gate.open();
        info!("Initial context loaded; gate open");

        Ok(ToolsCallResult::text(message))
    }
}
