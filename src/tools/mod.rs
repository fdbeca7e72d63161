//! Tool dispatch layer
//!
//! Registers the Spotify tools and enforces the initialization gate through
//! an explicit middleware wrapper applied uniformly at registration time.
//! Every handler is a thin parameter/field mapping over the client facade.

mod browse;
mod context;
mod instructions;
mod personalization;
mod playlists;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::auth::AuthFlow;
use crate::client::SpotifyClient;
use crate::config::Config;
use crate::gate::InitGate;
use crate::protocol::{Tool, ToolsCallResult};
use crate::{Error, Result};

/// Shared dependencies handed to every tool handler
pub struct ToolContext {
    /// Authenticated client facade
    pub client: SpotifyClient,
    /// Authorization flow controller (used by the initializer)
    pub flow: AuthFlow,
    /// Initialization gate
    pub gate: Arc<InitGate>,
    /// Startup configuration
    pub config: Config,
}

/// A single registered tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tool definition advertised over `tools/list`
    fn definition(&self) -> Tool;

    /// Execute the tool
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult>;
}

/// Middleware wrapper enforcing the gate check before the inner handler.
/// Applied to every registration; the gate itself lets the initializer pass.
struct Gated<H> {
    inner: H,
}

#[async_trait]
impl<H: ToolHandler> ToolHandler for Gated<H> {
    fn definition(&self) -> Tool {
        self.inner.definition()
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        ctx.gate.check(&self.inner.definition().name)?;
        self.inner.call(ctx, args).await
    }
}

/// Registry of all Spotify tools
pub struct ToolRegistry {
    ctx: ToolContext,
    handlers: HashMap<String, Box<dyn ToolHandler>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Build the registry with the full tool set registered
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        let mut registry = Self {
            ctx,
            handlers: HashMap::new(),
            order: Vec::new(),
        };

        registry.register(context::GetInitialContext);

        registry.register(playlists::GetUserPlaylists);
        registry.register(playlists::CreatePlaylist);
        registry.register(playlists::AddTracksToPlaylist);
        registry.register(playlists::RemoveTracksFromPlaylist);
        registry.register(playlists::UpdatePlaylistDetails);
        registry.register(playlists::ReorderPlaylistTracks);

        registry.register(browse::Search);
        registry.register(browse::GetNewReleases);
        registry.register(browse::GetFeaturedPlaylists);

        registry.register(personalization::GetUserTopItems);

        registry
    }

    fn register<H: ToolHandler + 'static>(&mut self, handler: H) {
        let name = handler.definition().name;
        self.order.push(name.clone());
        self.handlers.insert(name, Box::new(Gated { inner: handler }));
    }

    /// Tool definitions in registration order
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|h| h.definition())
            .collect()
    }

    /// Whether a tool with this name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Dispatch a tool call by name
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<ToolsCallResult> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| Error::Internal(format!("Unknown tool: {name}")))?;

        debug!(tool = name, "Dispatching tool call");
        handler.call(&self.ctx, args).await
    }

    /// Shared context (exposed for integration tests)
    #[must_use]
    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }
}

/// Render a tool result as a short message plus pretty-printed data
pub(crate) fn success_response(message: &str, data: &Value) -> Result<ToolsCallResult> {
    let body = serde_json::to_string_pretty(data)?;
    Ok(ToolsCallResult::text(format!("{message}\n\n{body}")))
}

/// Parse tool arguments, treating `null` as an empty object so tools with
/// all-optional parameters accept a bare call.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| Error::Internal(format!("Invalid tool arguments: {e}")))
}

/// Validate that every URI identifies a track
pub(crate) fn validate_track_uris(uris: &[String]) -> Result<()> {
    let invalid: Vec<&str> = uris
        .iter()
        .filter(|uri| !uri.starts_with("spotify:track:"))
        .map(String::as_str)
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(Error::Internal(format!(
            "Invalid track URIs detected. All URIs must start with \"spotify:track:\". Invalid: {}",
            invalid.join(", ")
        )))
    }
}
