//! Verification oracle: formats the final answer from step results.

use super::OracleClient;
use crate::schema::SchemaIssue;
use opsassist_core::error::OracleError;
use opsassist_core::plan::ExecutionResult;
use opsassist_core::usage::CallerCategory;

const SYSTEM_PROMPT: &str = "You are a Verifier Agent. Validate results and check completeness.\n\
Schema rules:\n\
- GitHub repository results must contain: name, stars, description\n\
- Weather results must contain: city, temp_c, condition\n\
- Every step has status success or failed\n\
If some steps failed or data is missing, say so clearly. \
Produce a concise, well-structured final answer for the user.";

pub struct Verifier {
    client: OracleClient,
}

impl Verifier {
    pub fn new(client: OracleClient) -> Self {
        Self { client }
    }

    /// Ask the model for the final answer. Not retried.
    pub async fn format_answer(
        &self,
        task: &str,
        results: &[ExecutionResult],
        issues: &[SchemaIssue],
    ) -> Result<String, OracleError> {
        let prompt = user_prompt(task, results, issues)?;
        self.client
            .ask(SYSTEM_PROMPT, &prompt, CallerCategory::Verifier)
            .await
    }
}

fn user_prompt(
    task: &str,
    results: &[ExecutionResult],
    issues: &[SchemaIssue],
) -> Result<String, OracleError> {
    let results_json = serde_json::to_string_pretty(results).map_err(|e| OracleError::Unparseable {
        reason: format!("could not serialize results: {e}"),
    })?;

    let issues_text = if issues.is_empty() {
        "None".to_string()
    } else {
        issues.iter().map(|i| format!("\n- {i}")).collect()
    };

    Ok(format!(
        "User Task: {task}\n\n\
Execution Results:\n{results_json}\n\n\
Schema Issues Found: {issues_text}\n\n\
Return a helpful final structured answer for the user. \
If there are still missing or incomplete data, mention it clearly."
    ))
}
