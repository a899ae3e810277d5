//! Step executor: runs one step against its tool with retry.

use crate::retry::{RetryPolicy, retry_with_backoff};
use opsassist_config::ExecutorConfig;
use opsassist_core::error::ToolError;
use opsassist_core::plan::{ExecutionResult, Step};
use opsassist_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Executes single steps. Never fails: tool errors become failed results.
pub struct StepExecutor {
    tools: Arc<ToolRegistry>,
    policy: RetryPolicy,
    attempt_timeout: Option<Duration>,
}

impl StepExecutor {
    pub fn new(tools: Arc<ToolRegistry>, policy: RetryPolicy) -> Self {
        Self {
            tools,
            policy,
            attempt_timeout: None,
        }
    }

    pub fn from_config(tools: Arc<ToolRegistry>, config: &ExecutorConfig) -> Self {
        Self::new(tools, RetryPolicy::from_config(config)).with_attempt_timeout(config.attempt_timeout())
    }

    /// Bound every tool attempt; a timed-out attempt counts as a failure.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Execute `step` under the executor's retry policy.
    pub async fn execute(&self, step: &Step) -> ExecutionResult {
        self.execute_with(step, &self.policy).await
    }

    /// Execute `step` under an explicit retry policy.
    pub async fn execute_with(&self, step: &Step, policy: &RetryPolicy) -> ExecutionResult {
        let Some(tool_name) = step.tool.as_deref().filter(|t| !t.is_empty()) else {
            return no_tool_result(step);
        };

        let Some(tool) = self.tools.get(tool_name) else {
            warn!(step_id = %step.id, tool = tool_name, "Unknown tool, treating step as no-op");
            return no_tool_result(step);
        };

        debug!(step_id = %step.id, tool = tool_name, "Executing step");

        let label = format!("step {} ({tool_name})", step.id);
        let outcome = retry_with_backoff(policy, &label, |_attempt| {
            let tool = tool.clone();
            let input = step.input.clone();
            let timeout = self.attempt_timeout;
            async move { invoke(tool.as_ref(), input, timeout).await }
        })
        .await;

        match outcome {
            Ok(output) => ExecutionResult::success(step, output),
            Err(e) => {
                warn!(step_id = %step.id, tool = tool_name, error = %e, "Step failed after retries");
                ExecutionResult::failed(step, e.to_string())
            }
        }
    }
}

async fn invoke(
    tool: &dyn Tool,
    input: serde_json::Value,
    timeout: Option<Duration>,
) -> Result<serde_json::Value, ToolError> {
    match timeout {
        None => tool.execute(input).await,
        Some(limit) => tokio::time::timeout(limit, tool.execute(input))
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: tool.name().to_string(),
                timeout_secs: limit.as_secs(),
            })?,
    }
}

fn no_tool_result(step: &Step) -> ExecutionResult {
    ExecutionResult::success(
        step,
        serde_json::json!({ "info": format!("No tool needed for: {}", step.action) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;

    fn executor(tool: Arc<MockTool>, attempts: u32) -> StepExecutor {
        StepExecutor::new(registry(vec![tool as Arc<dyn Tool>]), RetryPolicy::immediate(attempts))
    }

    #[tokio::test]
    async fn successful_tool_call() {
        let tool = Arc::new(MockTool::new("github_search", repos_output()));
        let exec = executor(tool.clone(), 3);
        let step = Step::new(1, "Search GitHub").with_tool("github_search").with_input("ai agents");

        let result = exec.execute(&step).await;
        assert!(result.is_success());
        assert_eq!(result.output(), Some(&repos_output()));
        assert_eq!(tool.inputs(), vec![json!("ai agents")]);
    }

    #[tokio::test]
    async fn step_without_tool_is_noop_success() {
        let exec = executor(Arc::new(MockTool::new("x", json!(null))), 3);
        let result = exec.execute(&Step::new(3, "Summarize findings")).await;
        assert!(result.is_success());
        assert_eq!(result.output().unwrap()["info"], "No tool needed for: Summarize findings");
    }

    #[tokio::test]
    async fn unknown_tool_is_noop_success() {
        let exec = executor(Arc::new(MockTool::new("x", json!(null))), 3);
        let step = Step::new(2, "Book a flight").with_tool("flight_booking");
        let result = exec.execute(&step).await;
        assert!(result.is_success());
        assert!(result.output().unwrap()["info"].as_str().unwrap().contains("Book a flight"));
    }

    #[tokio::test]
    async fn always_failing_tool_invoked_max_attempts() {
        let tool = Arc::new(MockTool::new("weather_lookup", json!({})).always_failing());
        let exec = executor(tool.clone(), 3);
        let step = Step::new(1, "Get weather").with_tool("weather_lookup").with_input("Atlantis");

        let result = exec.execute(&step).await;
        assert!(result.is_failed());
        assert_eq!(tool.calls(), 3);
        assert!(result.error().unwrap().contains("call 3 failed"));
    }

    #[tokio::test]
    async fn fail_twice_then_succeed() {
        let tool = Arc::new(MockTool::new("weather_lookup", json!({"city": "Paris"})).failing_first(2));
        let exec = executor(tool.clone(), 3);
        let step = Step::new(1, "Get weather").with_tool("weather_lookup");

        let result = exec.execute(&step).await;
        assert!(result.is_success());
        assert_eq!(tool.calls(), 3);
    }

    #[tokio::test]
    async fn explicit_policy_overrides_default() {
        let tool = Arc::new(MockTool::new("t", json!(1)).always_failing());
        let exec = executor(tool.clone(), 3);
        let result = exec
            .execute_with(&Step::new(1, "x").with_tool("t"), &RetryPolicy::immediate(1))
            .await;
        assert!(result.is_failed());
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_and_retry() {
        let tool = Arc::new(MockTool::new("t", json!(1)).with_delay(Duration::from_secs(10)));
        let exec = executor(tool.clone(), 2).with_attempt_timeout(Some(Duration::from_secs(1)));

        let result = exec.execute(&Step::new(1, "slow").with_tool("t")).await;
        assert!(result.is_failed());
        assert!(result.error().unwrap().contains("timed out"));
        assert_eq!(tool.calls(), 2);
    }
}
