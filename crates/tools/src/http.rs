//! Shared HTTP plumbing for the built-in tools.

use opsassist_core::error::ToolError;
use std::time::Duration;
use tracing::warn;

pub(crate) const USER_AGENT: &str = concat!("opsassist/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send `request` and decode a JSON body, mapping transport and status
/// failures to [`ToolError`].
pub(crate) async fn fetch_json(
    request: reqwest::RequestBuilder,
    tool_name: &str,
    timeout_secs: u64,
) -> Result<serde_json::Value, ToolError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ToolError::Timeout {
                tool_name: tool_name.into(),
                timeout_secs,
            }
        } else {
            ToolError::ExecutionFailed {
                tool_name: tool_name.into(),
                reason: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(tool = tool_name, status = status.as_u16(), "Tool request returned error");
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: format!("HTTP {}: {}", status.as_u16(), body.trim()),
        });
    }

    response.json().await.map_err(|e| ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: format!("invalid JSON response: {e}"),
    })
}
