//! Search and browse tools — thin mappings over the client facade

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolContext, ToolHandler, parse_args, success_response};
use crate::protocol::{Tool, ToolsCallResult};
use crate::{Error, Result};

fn default_limit() -> u32 {
    20
}

const SEARCH_TYPES: [&str; 6] = ["album", "artist", "playlist", "track", "show", "episode"];

// ============================================================================
// search
// ============================================================================

/// Full-text catalog search
pub struct Search;

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(rename = "type")]
    types: Vec<String>,
    #[serde(default)]
    market: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

#[async_trait]
impl ToolHandler for Search {
    fn definition(&self) -> Tool {
        Tool {
            name: "search".to_string(),
            description: Some(
                "Search Spotify for tracks, albums, artists, playlists, shows, or episodes. \
                 Supports field filters like artist:, album:, track:, year:"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "q": {"type": "string", "minLength": 1},
                    "type": {
                        "type": "array",
                        "items": {"type": "string", "enum": SEARCH_TYPES},
                        "minItems": 1
                    },
                    "market": {"type": "string", "description": "ISO 3166-1 alpha-2 country code"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50, "default": 20},
                    "offset": {"type": "integer", "minimum": 0, "default": 0}
                },
                "required": ["q", "type"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: SearchParams = parse_args(args)?;

        if let Some(bad) = params.types.iter().find(|t| !SEARCH_TYPES.contains(&t.as_str())) {
            return Err(Error::Internal(format!(
                "Unknown search type \"{bad}\"; expected one of {}",
                SEARCH_TYPES.join(", ")
            )));
        }

        let mut query = vec![
            ("q", params.q.clone()),
            ("type", params.types.join(",")),
            ("limit", params.limit.to_string()),
            ("offset", params.offset.to_string()),
        ];
        if let Some(market) = &params.market {
            query.push(("market", market.clone()));
        }

        let results = ctx.client.request(Method::GET, "/search", &query, None).await?;

        // One section per requested type: items plus pagination counters
        let mut sections = serde_json::Map::new();
        for kind in &params.types {
            let key = format!("{kind}s");
            if let Some(section) = results.get(&key) {
                sections.insert(
                    key,
                    json!({
                        "items": section["items"],
                        "total": section["total"],
                        "limit": section["limit"],
                        "offset": section["offset"],
                    }),
                );
            }
        }

        success_response(
            &format!("Search results for \"{}\"", params.q),
            &Value::Object(sections),
        )
    }
}

// ============================================================================
// get_new_releases
// ============================================================================

/// Newly released albums
pub struct GetNewReleases;

#[derive(Deserialize)]
struct NewReleasesParams {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    country: Option<String>,
}

#[async_trait]
impl ToolHandler for GetNewReleases {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_new_releases".to_string(),
            description: Some("Get newly released albums, optionally filtered by country".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50, "default": 20},
                    "offset": {"type": "integer", "minimum": 0, "default": 0},
                    "country": {"type": "string", "description": "ISO 3166-1 alpha-2 country code"}
                }
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: NewReleasesParams = parse_args(args)?;

        let mut query = vec![
            ("limit", params.limit.to_string()),
            ("offset", params.offset.to_string()),
        ];
        if let Some(country) = &params.country {
            query.push(("country", country.clone()));
        }

        let result = ctx
            .client
            .request(Method::GET, "/browse/new-releases", &query, None)
            .await?;
        let albums = &result["albums"];

        success_response(
            "New releases",
            &json!({
                "albums": albums["items"],
                "total": albums["total"],
                "limit": albums["limit"],
                "offset": albums["offset"],
            }),
        )
    }
}

// ============================================================================
// get_featured_playlists
// ============================================================================

/// Spotify-curated featured playlists
pub struct GetFeaturedPlaylists;

#[derive(Deserialize)]
struct FeaturedParams {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    locale: Option<String>,
}

#[async_trait]
impl ToolHandler for GetFeaturedPlaylists {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_featured_playlists".to_string(),
            description: Some("Get Spotify's featured playlists".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50, "default": 20},
                    "offset": {"type": "integer", "minimum": 0, "default": 0},
                    "locale": {"type": "string", "description": "Locale such as en_US"}
                }
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: FeaturedParams = parse_args(args)?;

        let mut query = vec![
            ("limit", params.limit.to_string()),
            ("offset", params.offset.to_string()),
        ];
        if let Some(locale) = &params.locale {
            query.push(("locale", locale.clone()));
        }

        let result = ctx
            .client
            .request(Method::GET, "/browse/featured-playlists", &query, None)
            .await?;
        let playlists = &result["playlists"];

        success_response(
            result["message"].as_str().unwrap_or("Featured playlists"),
            &json!({
                "playlists": playlists["items"],
                "total": playlists["total"],
                "limit": playlists["limit"],
                "offset": playlists["offset"],
            }),
        )
    }
}
