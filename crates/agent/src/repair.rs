//! Repair loop: validate step outputs and re-run failed steps once with
//! conservative fallback inputs.

use crate::scheduler::PlanScheduler;
use crate::schema::{self, SchemaIssue};
use opsassist_core::plan::{ExecutionResult, Step, StepId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What a repair pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
    /// One result per original step, sorted by step id.
    pub results: Vec<ExecutionResult>,
    /// Issues remaining after the merge.
    pub issues: Vec<SchemaIssue>,
    /// Issues found before any retry ran.
    pub initial_issues: Vec<SchemaIssue>,
    /// Original steps a retry was attempted for.
    pub retried: Vec<StepId>,
    /// Original steps whose failure was replaced by a successful retry.
    pub repaired: Vec<StepId>,
}

/// Single bounded verify-and-repair pass over a plan's results.
pub struct RepairLoop {
    scheduler: Arc<PlanScheduler>,
}

impl RepairLoop {
    pub fn new(scheduler: Arc<PlanScheduler>) -> Self {
        Self { scheduler }
    }

    pub async fn verify_and_repair(&self, task: &str, results: Vec<ExecutionResult>) -> RepairOutcome {
        let initial_issues = schema::validate(&results);
        if !initial_issues.is_empty() {
            debug!(issues = initial_issues.len(), "Schema issues in initial results");
        }

        let retry_steps = retry_plan(&results);
        if retry_steps.is_empty() {
            return RepairOutcome {
                issues: initial_issues.clone(),
                initial_issues,
                results,
                retried: Vec::new(),
                repaired: Vec::new(),
            };
        }

        let retried: Vec<StepId> = retry_steps
            .iter()
            .map(|s| StepId::Original(s.id.original()))
            .collect();
        info!(task, retries = retry_steps.len(), "Re-running failed steps with fallback input");

        let retry_results = self.scheduler.execute_plan(retry_steps).await;
        let (results, repaired) = merge(results, retry_results);
        let issues = schema::validate(&results);

        info!(
            retried = retried.len(),
            repaired = repaired.len(),
            remaining_issues = issues.len(),
            "Repair pass complete"
        );

        RepairOutcome {
            results,
            issues,
            initial_issues,
            retried,
            repaired,
        }
    }
}

/// Build one retry step per failed original whose category has a fallback.
fn retry_plan(results: &[ExecutionResult]) -> Vec<Step> {
    results
        .iter()
        .filter(|r| r.is_failed() && !r.step_id.is_retry())
        .filter_map(|r| {
            let input = r.category.fallback_input()?;
            let tool = r.category.default_tool()?;
            Some(Step {
                id: r.step_id.as_retry(),
                action: r.action.clone(),
                category: r.category,
                tool: Some(tool.to_string()),
                input,
            })
        })
        .collect()
}

/// Overwrite failed originals with successful retries, keeping original ids.
fn merge(
    mut results: Vec<ExecutionResult>,
    retries: Vec<ExecutionResult>,
) -> (Vec<ExecutionResult>, Vec<StepId>) {
    let mut repaired = Vec::new();

    for retry in retries.into_iter().filter(ExecutionResult::is_success) {
        let original = retry.step_id.original();
        if let Some(target) = results
            .iter_mut()
            .find(|r| !r.step_id.is_retry() && r.step_id.original() == original)
        {
            target.outcome = retry.outcome;
            repaired.push(target.step_id);
        }
    }

    results.sort_by_key(|r| r.step_id);
    (results, repaired)
}
