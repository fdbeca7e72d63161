//! Stdio MCP server
//!
//! Line-delimited JSON-RPC over stdin/stdout. Each request is handled to
//! completion before the next line is read; tool failures are returned as
//! `isError` tool results (the agent sees the actionable message), while
//! protocol-level problems become JSON-RPC errors.

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::protocol::{
    InitializeParams, InitializeResult, Info, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    PROTOCOL_VERSION, ServerCapabilities, ToolsCallParams, ToolsCallResult, ToolsCapability,
    ToolsListResult,
};
use crate::error::rpc_codes;
use crate::tools::ToolRegistry;
use crate::Result;

/// Server name reported during the initialize handshake
pub const SERVER_NAME: &str = "spotify-mcp";

/// MCP server over stdio
pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    /// Create a server around a tool registry
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve requests from stdin until EOF
    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        info!("Spotify MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let serialized = serde_json::to_string(&response)?;
                stdout.write_all(serialized.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one incoming line; notifications produce no response
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcMessage>(line) {
            Ok(JsonRpcMessage::Request(request)) => Some(self.handle_request(request).await),
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!(method = %notification.method, "Notification received");
                None
            }
            Err(e) => {
                error!(error = %e, "Failed to parse message");
                Some(JsonRpcResponse::error(
                    None,
                    rpc_codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ))
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => {
                let params: InitializeParams =
                    match serde_json::from_value(request.params.unwrap_or_default()) {
                        Ok(p) => p,
                        Err(e) => {
                            return JsonRpcResponse::error(
                                Some(id),
                                rpc_codes::INVALID_PARAMS,
                                format!("Invalid initialize params: {e}"),
                            );
                        }
                    };
                if params.protocol_version != PROTOCOL_VERSION {
                    debug!(
                        requested = %params.protocol_version,
                        supported = PROTOCOL_VERSION,
                        "Client requested a different protocol version"
                    );
                }

                // Respond with the version this server speaks; the client
                // decides whether to proceed.
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability { list_changed: None }),
                    },
                    server_info: Info {
                        name: SERVER_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    instructions: Some(
                        "Call get_initial_context before any other tool.".to_string(),
                    ),
                };
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => internal_error(id, &e),
                }
            }

            "ping" => JsonRpcResponse::success(id, json!({})),

            "tools/list" => {
                let result = ToolsListResult {
                    tools: self.registry.definitions(),
                };
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => internal_error(id, &e),
                }
            }

            "tools/call" => {
                let params: ToolsCallParams =
                    match serde_json::from_value(request.params.unwrap_or_default()) {
                        Ok(p) => p,
                        Err(e) => {
                            return JsonRpcResponse::error(
                                Some(id),
                                rpc_codes::INVALID_PARAMS,
                                format!("Invalid tools/call params: {e}"),
                            );
                        }
                    };

                if !self.registry.contains(&params.name) {
                    return JsonRpcResponse::error(
                        Some(id),
                        rpc_codes::INVALID_PARAMS,
                        format!("Unknown tool: {}", params.name),
                    );
                }

                // Tool failures (gate closed, auth, upstream) are tool
                // results, not protocol errors — the agent reads the text.
                let result = match self.registry.dispatch(&params.name, params.arguments).await {
                    Ok(result) => result,
                    Err(e) => ToolsCallResult::error(e.to_string()),
                };
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => internal_error(id, &e),
                }
            }

            other => JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        }
    }
}

fn internal_error(id: crate::protocol::RequestId, e: &serde_json::Error) -> JsonRpcResponse {
    JsonRpcResponse::error(
        Some(id),
        rpc_codes::INTERNAL_ERROR,
        format!("Serialization error: {e}"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;
    use crate::auth::{AuthFlow, TokenStore};
    use crate::client::SpotifyClient;
    use crate::config::Config;
    use crate::gate::InitGate;
    use crate::tools::ToolContext;

    fn server() -> McpServer {
        let config = Config {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://127.0.0.1:8000/callback".to_string(),
            ..Config::default()
        };
        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenStore::new());
        let ctx = ToolContext {
            client: SpotifyClient::new(http.clone(), config.clone(), Arc::clone(&tokens)),
            flow: AuthFlow::new(http, config.clone(), tokens),
            gate: Arc::new(InitGate::new()),
            config,
        };
        McpServer::new(ToolRegistry::new(ctx))
    }

    async fn respond(line: &str) -> Value {
        let response = server().handle_line(line).await.expect("expected a response");
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server_info_and_protocol() {
        let value = respond(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        )
        .await;
        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["result"]["serverInfo"]["name"], SERVER_NAME);
        assert!(value["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn initialize_without_a_protocol_version_is_invalid() {
        let value = respond(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#).await;
        assert_eq!(value["error"]["code"], rpc_codes::INVALID_PARAMS);
        assert_eq!(value["id"], 1);
    }

    #[tokio::test]
    async fn initialize_answers_a_mismatched_version_with_its_own() {
        let value = respond(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2019-01-01"}}"#,
        )
        .await;
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn ping_returns_an_empty_result() {
        let value = respond(r#"{"jsonrpc":"2.0","id":"p1","method":"ping"}"#).await;
        assert_eq!(value["id"], "p1");
        assert_eq!(value["result"], json!({}));
    }

    #[tokio::test]
    async fn tools_list_leads_with_the_initializer() {
        let value = respond(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        let tools = value["result"]["tools"].as_array().unwrap();
        assert!(tools.len() >= 11);
        assert_eq!(tools[0]["name"], "get_initial_context");
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn invalid_json_is_a_parse_error() {
        let value = respond("{not json").await;
        assert_eq!(value["error"]["code"], rpc_codes::PARSE_ERROR);
        assert!(value.get("id").is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let value = respond(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#).await;
        assert_eq!(value["error"]["code"], rpc_codes::METHOD_NOT_FOUND);
        assert_eq!(value["id"], 3);
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let value = respond(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"no_such_tool"}}"#,
        )
        .await;
        assert_eq!(value["error"]["code"], rpc_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn gated_tool_failure_is_a_tool_result_not_a_protocol_error() {
        let value = respond(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"get_user_playlists","arguments":{}}}"#,
        )
        .await;
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["isError"], true);
        let text = value["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("get_initial_context"));
    }
}
