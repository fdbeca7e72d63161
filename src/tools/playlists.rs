//! Playlist tools — thin mappings over the client facade

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolContext, ToolHandler, parse_args, success_response, validate_track_uris};
use crate::protocol::{Tool, ToolsCallResult};
use crate::{Error, Result};

fn default_limit() -> u32 {
    20
}

/// Trim a playlist object to the fields agents need
fn trim_playlist(playlist: &Value) -> Value {
    json!({
        "id": playlist["id"],
        "name": playlist["name"],
        "description": playlist["description"],
        "public": playlist["public"],
        "collaborative": playlist["collaborative"],
        "tracks": { "total": playlist.pointer("/tracks/total") },
        "owner": {
            "id": playlist.pointer("/owner/id"),
            "display_name": playlist.pointer("/owner/display_name"),
        },
        "external_urls": playlist["external_urls"],
        "snapshot_id": playlist["snapshot_id"],
    })
}

fn trim_page(page: &Value) -> Value {
    json!({
        "total": page["total"],
        "limit": page["limit"],
        "offset": page["offset"],
        "next": page["next"],
        "previous": page["previous"],
    })
}

// ============================================================================
// get_user_playlists
// ============================================================================

/// List the current (or a named) user's playlists
pub struct GetUserPlaylists;

#[derive(Deserialize)]
struct GetUserPlaylistsParams {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    user_id: Option<String>,
}

#[async_trait]
impl ToolHandler for GetUserPlaylists {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_user_playlists".to_string(),
            description: Some("Get a user's playlists (current user if no user_id given)".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50, "default": 20},
                    "offset": {"type": "integer", "minimum": 0, "default": 0},
                    "user_id": {"type": "string", "description": "User ID to get playlists for"}
                }
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: GetUserPlaylistsParams = parse_args(args)?;

        let path = match &params.user_id {
            Some(user_id) => format!("/users/{user_id}/playlists"),
            None => "/me/playlists".to_string(),
        };
        let query = [
            ("limit", params.limit.to_string()),
            ("offset", params.offset.to_string()),
        ];

        let page = ctx.client.request(Method::GET, &path, &query, None).await?;
        let playlists: Vec<Value> = page["items"]
            .as_array()
            .map(|items| items.iter().map(trim_playlist).collect())
            .unwrap_or_default();

        success_response(
            &format!("Retrieved {} playlists", playlists.len()),
            &json!({ "playlists": playlists, "pagination": trim_page(&page) }),
        )
    }
}

// ============================================================================
// create_playlist
// ============================================================================

/// Create a playlist for the current user
pub struct CreatePlaylist;

#[derive(Deserialize)]
struct CreatePlaylistParams {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    public: Option<bool>,
    #[serde(default)]
    collaborative: Option<bool>,
}

#[async_trait]
impl ToolHandler for CreatePlaylist {
    fn definition(&self) -> Tool {
        Tool {
            name: "create_playlist".to_string(),
            description: Some("Create a new playlist for the current user".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "description": {"type": "string"},
                    "public": {"type": "boolean", "default": false},
                    "collaborative": {"type": "boolean", "default": false}
                },
                "required": ["name"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: CreatePlaylistParams = parse_args(args)?;
        if params.name.trim().is_empty() {
            return Err(Error::Internal("Playlist name must not be empty".to_string()));
        }

        let me = ctx.client.current_user().await?;
        let user_id = me["id"]
            .as_str()
            .ok_or_else(|| Error::Internal("Current user has no ID".to_string()))?;

        let body = json!({
            "name": params.name,
            "description": params.description,
            "public": params.public.unwrap_or(false),
            "collaborative": params.collaborative.unwrap_or(false),
        });

        let playlist = ctx
            .client
            .request(Method::POST, &format!("/users/{user_id}/playlists"), &[], Some(&body))
            .await?;

        success_response(
            &format!("Created playlist \"{}\"", params.name),
            &trim_playlist(&playlist),
        )
    }
}

// ============================================================================
// add_tracks_to_playlist
// ============================================================================

/// Append tracks to a playlist
pub struct AddTracksToPlaylist;

#[derive(Debug, Deserialize)]
struct AddTracksParams {
    playlist_id: String,
    uris: Vec<String>,
    #[serde(default)]
    position: Option<u32>,
}

#[async_trait]
impl ToolHandler for AddTracksToPlaylist {
    fn definition(&self) -> Tool {
        Tool {
            name: "add_tracks_to_playlist".to_string(),
            description: Some("Add tracks (by spotify:track: URI) to a playlist".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "playlist_id": {"type": "string"},
                    "uris": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                        "maxItems": 100,
                        "description": "Spotify track URIs (spotify:track:...)"
                    },
                    "position": {"type": "integer", "minimum": 0}
                },
                "required": ["playlist_id", "uris"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: AddTracksParams = parse_args(args)?;
        validate_track_uris(&params.uris)?;

        let mut body = json!({ "uris": params.uris });
        if let Some(position) = params.position {
            body["position"] = json!(position);
        }

        let result = ctx
            .client
            .request(
                Method::POST,
                &format!("/playlists/{}/tracks", params.playlist_id),
                &[],
                Some(&body),
            )
            .await?;

        success_response(
            &format!("Added {} tracks to playlist", params.uris.len()),
            &json!({ "snapshot_id": result["snapshot_id"] }),
        )
    }
}

// ============================================================================
// remove_tracks_from_playlist
// ============================================================================

/// Remove tracks from a playlist
pub struct RemoveTracksFromPlaylist;

#[derive(Deserialize)]
struct RemoveTracksParams {
    playlist_id: String,
    uris: Vec<String>,
}

#[async_trait]
impl ToolHandler for RemoveTracksFromPlaylist {
    fn definition(&self) -> Tool {
        Tool {
            name: "remove_tracks_from_playlist".to_string(),
            description: Some("Remove tracks (by spotify:track: URI) from a playlist".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "playlist_id": {"type": "string"},
                    "uris": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                        "maxItems": 100
                    }
                },
                "required": ["playlist_id", "uris"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: RemoveTracksParams = parse_args(args)?;
        validate_track_uris(&params.uris)?;

        let tracks: Vec<Value> = params.uris.iter().map(|uri| json!({ "uri": uri })).collect();
        let body = json!({ "tracks": tracks });

        let result = ctx
            .client
            .request(
                Method::DELETE,
                &format!("/playlists/{}/tracks", params.playlist_id),
                &[],
                Some(&body),
            )
            .await?;

        success_response(
            &format!("Removed {} tracks from playlist", params.uris.len()),
            &json!({ "snapshot_id": result["snapshot_id"] }),
        )
    }
}

// ============================================================================
// update_playlist_details
// ============================================================================

/// Change a playlist's name, description, or visibility
pub struct UpdatePlaylistDetails;

#[derive(Deserialize)]
struct UpdateDetailsParams {
    playlist_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    public: Option<bool>,
}

#[async_trait]
impl ToolHandler for UpdatePlaylistDetails {
    fn definition(&self) -> Tool {
        Tool {
            name: "update_playlist_details".to_string(),
            description: Some("Update a playlist's name, description, or public flag".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "playlist_id": {"type": "string"},
                    "name": {"type": "string"},
                    "description": {"type": "string"},
                    "public": {"type": "boolean"}
                },
                "required": ["playlist_id"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: UpdateDetailsParams = parse_args(args)?;

        let mut body = serde_json::Map::new();
        if let Some(name) = params.name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(description) = params.description {
            body.insert("description".to_string(), json!(description));
        }
        if let Some(public) = params.public {
            body.insert("public".to_string(), json!(public));
        }
        if body.is_empty() {
            return Err(Error::Internal(
                "Provide at least one of name, description, or public".to_string(),
            ));
        }

        ctx.client
            .request(
                Method::PUT,
                &format!("/playlists/{}", params.playlist_id),
                &[],
                Some(&Value::Object(body)),
            )
            .await?;

        success_response("Playlist details updated", &json!({ "playlist_id": params.playlist_id }))
    }
}

// ============================================================================
// reorder_playlist_tracks
// ============================================================================

/// Move a range of tracks within a playlist
pub struct ReorderPlaylistTracks;

#[derive(Deserialize)]
struct ReorderParams {
    playlist_id: String,
    range_start: u32,
    insert_before: u32,
    #[serde(default)]
    range_length: Option<u32>,
}

#[async_trait]
impl ToolHandler for ReorderPlaylistTracks {
    fn definition(&self) -> Tool {
        Tool {
            name: "reorder_playlist_tracks".to_string(),
            description: Some("Move a range of tracks to another position in a playlist".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "playlist_id": {"type": "string"},
                    "range_start": {"type": "integer", "minimum": 0},
                    "insert_before": {"type": "integer", "minimum": 0},
                    "range_length": {"type": "integer", "minimum": 1, "default": 1}
                },
                "required": ["playlist_id", "range_start", "insert_before"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: ReorderParams = parse_args(args)?;

        let body = json!({
            "range_start": params.range_start,
            "insert_before": params.insert_before,
            "range_length": params.range_length.unwrap_or(1),
        });

        let result = ctx
            .client
            .request(
                Method::PUT,
                &format!("/playlists/{}/tracks", params.playlist_id),
                &[],
                Some(&body),
            )
            .await?;

        success_response("Playlist tracks reordered", &json!({ "snapshot_id": result["snapshot_id"] }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_playlist_keeps_only_the_summary_fields() {
        let full = json!({
            "id": "p1",
            "name": "Mix",
            "description": "d",
            "public": true,
            "collaborative": false,
            "tracks": {"total": 3, "href": "https://api.spotify.com/..." },
            "owner": {"id": "u1", "display_name": "User", "href": "..."},
            "external_urls": {"spotify": "https://open.spotify.com/playlist/p1"},
            "snapshot_id": "snap",
            "images": [{"url": "..."}],
            "followers": {"total": 10}
        });
        let trimmed = trim_playlist(&full);
        assert_eq!(trimmed["id"], "p1");
        assert_eq!(trimmed["tracks"]["total"], 3);
        assert_eq!(trimmed["owner"]["display_name"], "User");
        assert!(trimmed.get("images").is_none());
        assert!(trimmed.get("followers").is_none());
    }

    #[test]
    fn add_tracks_params_require_playlist_and_uris() {
        let err = parse_args::<AddTracksParams>(json!({"playlist_id": "p"})).unwrap_err();
        assert!(err.to_string().contains("Invalid tool arguments"));

        let ok: AddTracksParams =
            parse_args(json!({"playlist_id": "p", "uris": ["spotify:track:x"]})).unwrap();
        assert_eq!(ok.uris.len(), 1);
        assert!(ok.position.is_none());
    }
}
