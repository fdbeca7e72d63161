//! Personalization tools

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolContext, ToolHandler, parse_args, success_response};
use crate::protocol::{Tool, ToolsCallResult};
use crate::{Error, Result};

/// The user's top artists or tracks over a time range
pub struct GetUserTopItems;

#[derive(Deserialize)]
struct TopItemsParams {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    time_range: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    20
}

#[async_trait]
impl ToolHandler for GetUserTopItems {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_user_top_items".to_string(),
            description: Some(
                "Get the current user's top artists or tracks over short_term, medium_term, \
                 or long_term"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": {"type": "string", "enum": ["artists", "tracks"]},
                    "time_range": {
                        "type": "string",
                        "enum": ["short_term", "medium_term", "long_term"],
                        "default": "medium_term"
                    },
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50, "default": 20},
                    "offset": {"type": "integer", "minimum": 0, "default": 0}
                },
                "required": ["type"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<ToolsCallResult> {
        let params: TopItemsParams = parse_args(args)?;

        if params.kind != "artists" && params.kind != "tracks" {
            return Err(Error::Internal(format!(
                "type must be \"artists\" or \"tracks\", got \"{}\"",
                params.kind
            )));
        }

        let time_range = params.time_range.as_deref().unwrap_or("medium_term");
        let query = [
            ("time_range", time_range.to_string()),
            ("limit", params.limit.to_string()),
            ("offset", params.offset.to_string()),
        ];

        let result = ctx
            .client
            .request(Method::GET, &format!("/me/top/{}", params.kind), &query, None)
            .await?;

        success_response(
            &format!("Top {} ({time_range})", params.kind),
            &json!({
                "items": result["items"],
                "total": result["total"],
                "limit": result["limit"],
                "offset": result["offset"],
            }),
        )
    }
}
