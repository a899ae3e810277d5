//! GitHub repository search.
//!
//! Queries the search API sorted by stars and returns the top results as
//! `{name, stars, description}` records.

use crate::http;
use async_trait::async_trait;
use opsassist_config::ToolsConfig;
use opsassist_core::error::ToolError;
use opsassist_core::tool::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

const TOOL_NAME: &str = "github_search";

pub struct GithubSearchTool {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    default_limit: usize,
    timeout_secs: u64,
}

impl GithubSearchTool {
    pub fn new(api_url: impl Into<String>, token: Option<String>, default_limit: usize) -> Self {
        let timeout_secs = 30;
        Self {
            client: http::build_client(timeout_secs),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            default_limit,
            timeout_secs,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            client: http::build_client(config.http_timeout_secs),
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone(),
            default_limit: config.github_result_limit,
            timeout_secs: config.http_timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for GithubSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search GitHub for repositories matching a query, sorted by stars. \
         Returns the top results with name, stars, and description."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search terms, e.g. \"ai agents\""
                },
                "limit": {
                    "type": "integer",
                    "description": "Number of repositories to return (default 3)",
                    "default": 3
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let (query, limit) = parse_input(&input, self.default_limit)?;
        debug!(query = %query, limit, "Searching GitHub repositories");

        let mut request = self
            .client
            .get(format!("{}/search/repositories", self.api_url))
            .query(&[("q", query.as_str()), ("sort", "stars")])
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {token}"));
        }

        let body = http::fetch_json(request, TOOL_NAME, self.timeout_secs).await?;
        parse_repositories(&body, limit)
    }
}

/// Accept either a bare query string or `{"query", "limit"}`.
fn parse_input(input: &Value, default_limit: usize) -> Result<(String, usize), ToolError> {
    let (query, limit) = match input {
        Value::String(q) => (q.as_str(), None),
        Value::Object(map) => (
            map.get("query").and_then(Value::as_str).unwrap_or_default(),
            map.get("limit").and_then(Value::as_u64),
        ),
        _ => ("", None),
    };

    let query = query.trim();
    if query.is_empty() {
        return Err(ToolError::InvalidArguments(
            "github_search requires a non-empty 'query'".into(),
        ));
    }

    let limit = limit
        .map(|n| n as usize)
        .filter(|n| *n > 0)
        .unwrap_or(default_limit);
    Ok((query.to_string(), limit))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    full_name: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    description: Option<String>,
}

/// Reduce a search API body to the top `limit` repository records.
pub fn parse_repositories(body: &Value, limit: usize) -> Result<Value, ToolError> {
    let response: SearchResponse =
        serde_json::from_value(body.clone()).map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: format!("unexpected search response: {e}"),
        })?;

    let repos: Vec<Value> = response
        .items
        .into_iter()
        .take(limit)
        .map(|item| {
            json!({
                "name": item.full_name,
                "stars": item.stargazers_count,
                "description": item.description,
            })
        })
        .collect();

    Ok(Value::Array(repos))
}
