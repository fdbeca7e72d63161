//! Client facade and initialization gate tests
//!
//! The Spotify Web API and the accounts token endpoint are mocked; the
//! facade's refresh-once policy and the gate's tool-call contract are
//! exercised through the public surfaces.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use spotify_mcp::Error;
use spotify_mcp::auth::{AuthFlow, TokenStore};
use spotify_mcp::client::SpotifyClient;
use spotify_mcp::config::Config;
use spotify_mcp::gate::{INITIALIZER_TOOL, InitGate};
use spotify_mcp::protocol::ToolsCallResult;
use spotify_mcp::tools::{ToolContext, ToolRegistry};

fn test_config(base_url: &str) -> Config {
    Config {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        redirect_uri: "http://127.0.0.1:8000/callback".to_string(),
        accounts_base_url: Some(base_url.to_string()),
        api_base_url: Some(base_url.to_string()),
        ..Config::default()
    }
}

fn client_with(base_url: &str, tokens: Arc<TokenStore>) -> SpotifyClient {
    SpotifyClient::new(reqwest::Client::new(), test_config(base_url), tokens)
}

fn registry_with(base_url: &str, tokens: Arc<TokenStore>) -> ToolRegistry {
    let config = test_config(base_url);
    let http = reqwest::Client::new();
    ToolRegistry::new(ToolContext {
        client: SpotifyClient::new(http.clone(), config.clone(), Arc::clone(&tokens)),
        flow: AuthFlow::new(http, config.clone(), tokens),
        gate: Arc::new(InitGate::new()),
        config,
    })
}

fn result_text(result: &ToolsCallResult) -> String {
    serde_json::to_value(result).unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// Refresh-once policy
// ============================================================================

#[tokio::test]
async fn expired_token_triggers_one_refresh_and_one_retry() {
    let mut server = mockito::Server::new_async().await;

    let rejected = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer stale-token")
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
        .expect(1)
        .create_async()
        .await;
    let refreshed = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"fresh-token","token_type":"Bearer","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"user-1","display_name":"Test User"}"#)
        .expect(1)
        .create_async()
        .await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("stale-token".to_string(), Some("refresh-1".to_string()), None);
    let client = client_with(&server.url(), Arc::clone(&tokens));

    let me = client.current_user().await.unwrap();
    assert_eq!(me["id"], "user-1");

    // The store holds the refreshed token, refresh token carried over
    let creds = tokens.get().unwrap();
    assert_eq!(creds.access_token, "fresh-token");
    assert_eq!(creds.refresh_token.as_deref(), Some("refresh-1"));

    rejected.assert_async().await;
    refreshed.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn failed_refresh_propagates_the_original_auth_error() {
    let mut server = mockito::Server::new_async().await;

    let rejected = server
        .mock("GET", "/me")
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh_denied = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#)
        .expect(1)
        .create_async()
        .await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("stale-token".to_string(), Some("revoked".to_string()), None);
    let client = client_with(&server.url(), Arc::clone(&tokens));

    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, Error::AuthExpired(_)));
    assert!(err.to_string().contains("The access token expired"));

    rejected.assert_async().await;
    refresh_denied.assert_async().await;
}

#[tokio::test]
async fn retry_that_fails_again_does_not_loop() {
    let mut server = mockito::Server::new_async().await;

    // Both the original call and the single retry are rejected
    let rejected = server
        .mock("GET", "/me")
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"Invalid access token"}}"#)
        .expect(2)
        .create_async()
        .await;
    let refreshed = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"still-bad","token_type":"Bearer","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("stale".to_string(), Some("refresh-1".to_string()), None);
    let client = client_with(&server.url(), tokens);

    let err = client.current_user().await.unwrap_err();
    assert!(err.is_auth_expired());

    rejected.assert_async().await;
    refreshed.assert_async().await;
}

#[tokio::test]
async fn missing_refresh_token_surfaces_the_auth_error_without_retry() {
    let mut server = mockito::Server::new_async().await;
    let rejected = server
        .mock("GET", "/me")
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
        .expect(1)
        .create_async()
        .await;
    let token_endpoint = server.mock("POST", "/api/token").expect(0).create_async().await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("stale".to_string(), None, None);
    let client = client_with(&server.url(), tokens);

    let err = client.current_user().await.unwrap_err();
    assert!(err.is_auth_expired());

    rejected.assert_async().await;
    token_endpoint.assert_async().await;
}

#[tokio::test]
async fn non_auth_upstream_errors_propagate_unchanged() {
    let mut server = mockito::Server::new_async().await;
    let not_found = server
        .mock("GET", "/me")
        .with_status(404)
        .with_body(r#"{"error":{"status":404,"message":"Not found."}}"#)
        .expect(1)
        .create_async()
        .await;
    let token_endpoint = server.mock("POST", "/api/token").expect(0).create_async().await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("valid".to_string(), Some("refresh".to_string()), None);
    let client = client_with(&server.url(), tokens);

    let err = client.current_user().await.unwrap_err();
    match err {
        Error::Upstream { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not found.");
        }
        other => panic!("expected Upstream, got {other:?}"),
    }

    not_found.assert_async().await;
    token_endpoint.assert_async().await;
}

// ============================================================================
// Gate contract through the tool registry
// ============================================================================

#[tokio::test]
async fn tool_fails_before_initialization_and_succeeds_after() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/me/playlists")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items":[{"id":"p1","name":"Road Trip","tracks":{"total":12},"owner":{"id":"u1","display_name":"Me"}}],"total":1,"limit":20,"offset":0,"next":null,"previous":null}"#,
        )
        .create_async()
        .await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("valid-token".to_string(), None, None);
    let registry = registry_with(&server.url(), tokens);

    // Closed gate: not-initialized error, no upstream call needed
    let err = registry
        .dispatch("get_user_playlists", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotInitialized));

    // Same call once the gate is open succeeds
    registry.context().gate.open();
    let result = registry
        .dispatch("get_user_playlists", json!({"limit": 20}))
        .await
        .unwrap();
    let text = result_text(&result);
    assert!(text.contains("Retrieved 1 playlists"));
    assert!(text.contains("Road Trip"));
}

#[tokio::test]
async fn initializer_with_usable_tokens_opens_the_gate_without_a_flow() {
    let mut server = mockito::Server::new_async().await;
    let me = server
        .mock("GET", "/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"user-1","display_name":"Test User","country":"FI","product":"premium","followers":{"total":5}}"#,
        )
        .expect(2)
        .create_async()
        .await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("valid-token".to_string(), Some("refresh".to_string()), None);
    let registry = registry_with(&server.url(), tokens);

    assert!(!registry.context().gate.is_open());

    let result = registry
        .dispatch(INITIALIZER_TOOL, Value::Null)
        .await
        .unwrap();
    assert!(registry.context().gate.is_open());
    let text = result_text(&result);
    assert!(text.contains("Test User"));
    assert!(text.contains("get_initial_context"));
    assert!(!text.contains("valid-token"), "tokens must never leak");

    // Idempotent: a second call re-validates connectivity, gate stays open
    registry.dispatch(INITIALIZER_TOOL, Value::Null).await.unwrap();
    assert!(registry.context().gate.is_open());
    me.assert_async().await;
}

#[tokio::test]
async fn initializer_with_invalid_config_leaves_the_gate_closed() {
    let tokens = Arc::new(TokenStore::new());
    let mut config = test_config("http://127.0.0.1:1");
    config.client_id = String::new();
    let http = reqwest::Client::new();
    let registry = ToolRegistry::new(ToolContext {
        client: SpotifyClient::new(http.clone(), config.clone(), Arc::clone(&tokens)),
        flow: AuthFlow::new(http, config.clone(), tokens),
        gate: Arc::new(InitGate::new()),
        config,
    });

    let err = registry
        .dispatch(INITIALIZER_TOOL, Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("SPOTIFY_CLIENT_ID"));
    assert!(!registry.context().gate.is_open());
}

#[tokio::test]
async fn track_uri_validation_rejects_before_any_upstream_call() {
    let mut server = mockito::Server::new_async().await;
    let add = server
        .mock("POST", mockito::Matcher::Regex("/playlists/.*".to_string()))
        .expect(0)
        .create_async()
        .await;

    let tokens = Arc::new(TokenStore::new());
    tokens.set("valid".to_string(), None, None);
    let registry = registry_with(&server.url(), tokens);
    registry.context().gate.open();

    let err = registry
        .dispatch(
            "add_tracks_to_playlist",
            json!({"playlist_id": "p1", "uris": ["spotify:album:not-a-track"]}),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("spotify:track:"));
    add.assert_async().await;
}
