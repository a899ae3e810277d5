//! Error types for the OpsAssist domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.
//!
//! Failure containment differs by context: a [`ToolError`] never escapes the
//! step executor (it becomes a failed step result), while an [`OracleError`]
//! is fatal to an orchestration run and propagates to the caller.

use thiserror::Error;

use crate::usage::CallerCategory;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures of the planning or verification oracle.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("oracle provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("{caller} oracle returned an empty response")]
    EmptyResponse { caller: CallerCategory },

    #[error("oracle output could not be parsed: {reason}")]
    Unparseable { reason: String },

    #[error("plan rejected: {0}")]
    InvalidPlan(String),
}
