//! End-to-end orchestration: plan, execute, repair, answer.

use crate::executor::StepExecutor;
use crate::oracle::{OracleClient, Planner, Verifier};
use crate::repair::{RepairLoop, RepairOutcome};
use crate::scheduler::PlanScheduler;
use crate::schema::SchemaIssue;
use opsassist_config::AppConfig;
use opsassist_core::error::OracleError;
use opsassist_core::plan::{ExecutionResult, Step, StepId};
use opsassist_core::provider::Provider;
use opsassist_core::tool::ToolRegistry;
use opsassist_core::usage::UsageSink;
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub task: String,
    pub plan: Vec<Step>,
    pub results: Vec<ExecutionResult>,
    pub issues: Vec<SchemaIssue>,
    pub retried: Vec<StepId>,
    pub repaired: Vec<StepId>,
    pub answer: String,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }
}

/// Drives a task through the planner, the scheduler, the repair loop and
/// the verifier.
///
/// Tool failures end up as failed results in the report. Only oracle
/// failures abort a run.
pub struct Orchestrator {
    planner: Planner,
    scheduler: Arc<PlanScheduler>,
    repair: RepairLoop,
    verifier: Verifier,
}

impl Orchestrator {
    pub fn new(client: OracleClient, scheduler: Arc<PlanScheduler>) -> Self {
        let planner = Planner::new(client.clone(), scheduler.executor().tools());
        Self {
            planner,
            repair: RepairLoop::new(scheduler.clone()),
            scheduler,
            verifier: Verifier::new(client),
        }
    }

    /// Wire an orchestrator from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        usage: Arc<dyn UsageSink>,
    ) -> Self {
        let client = OracleClient::from_config(provider, config).with_usage(usage);
        let executor = Arc::new(StepExecutor::from_config(tools, &config.executor));
        let scheduler = Arc::new(PlanScheduler::new(executor, config.executor.max_workers));
        Self::new(client, scheduler)
    }

    pub fn scheduler(&self) -> &Arc<PlanScheduler> {
        &self.scheduler
    }

    pub async fn plan(&self, task: &str) -> Result<Vec<Step>, OracleError> {
        self.planner.plan(task).await
    }

    pub async fn execute(&self, plan: &[Step]) -> Vec<ExecutionResult> {
        self.scheduler.execute_plan(plan.to_vec()).await
    }

    pub async fn repair(&self, task: &str, results: Vec<ExecutionResult>) -> RepairOutcome {
        self.repair.verify_and_repair(task, results).await
    }

    pub async fn answer(
        &self,
        task: &str,
        results: &[ExecutionResult],
        issues: &[SchemaIssue],
    ) -> Result<String, OracleError> {
        self.verifier.format_answer(task, results, issues).await
    }

    /// Run every stage for `task`.
    pub async fn run(&self, task: &str) -> Result<RunReport, OracleError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_stages(run_id, task).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid, task: &str) -> Result<RunReport, OracleError> {
        info!(task, "Starting run");

        let plan = self.plan(task).await?;
        let results = self.execute(&plan).await;
        let outcome = self.repair(task, results).await;
        let answer = self.answer(task, &outcome.results, &outcome.issues).await?;

        let report = RunReport {
            run_id,
            task: task.to_string(),
            plan,
            results: outcome.results,
            issues: outcome.issues,
            retried: outcome.retried,
            repaired: outcome.repaired,
            answer,
        };
        info!(
            steps = report.results.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Run complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::test_helpers::*;
    use opsassist_core::error::ProviderError;
    use opsassist_core::tool::Tool;
    use opsassist_core::usage::CallerCategory;
    use serde_json::json;

    const PLAN: &str = r#"[
        {"step_id": 1, "action": "Search GitHub repositories", "tool": "github_search", "input": "ai agents"},
        {"step_id": 2, "action": "Get weather", "tool": "weather_lookup", "input": "Tokyo"}
    ]"#;

    fn orchestrator(provider: Arc<ScriptedProvider>, tools: Vec<Arc<dyn Tool>>) -> (Orchestrator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let client = OracleClient::new(provider, "mock-model").with_usage(sink.clone());
        let executor = Arc::new(StepExecutor::new(registry(tools), RetryPolicy::immediate(2)));
        let scheduler = Arc::new(PlanScheduler::new(executor, 4));
        (Orchestrator::new(client, scheduler), sink)
    }

    #[tokio::test]
    async fn full_run_produces_report() {
        let provider = Arc::new(ScriptedProvider::texts(&[PLAN, "Here are your repos and weather."]));
        let weather = Arc::new(MockTool::responding("weather_lookup", weather_for));
        let (orch, sink) = orchestrator(
            provider.clone(),
            vec![
                Arc::new(MockTool::new("github_search", repos_output())) as Arc<dyn Tool>,
                weather.clone(),
            ],
        );

        let report = orch.run("find popular repos and the weather in Tokyo").await.unwrap();

        assert_eq!(report.plan.len(), 2);
        assert_eq!(report.succeeded(), 2);
        assert!(report.issues.is_empty());
        assert!(report.retried.is_empty());
        assert_eq!(report.answer, "Here are your repos and weather.");
        assert_eq!(report.results[1].output().unwrap()["city"], "Tokyo");
        assert_eq!(provider.call_count(), 2);
        let callers: Vec<_> = sink.calls().into_iter().map(|(_, c)| c).collect();
        assert_eq!(callers, vec![CallerCategory::Planner, CallerCategory::Verifier]);
    }

    #[tokio::test]
    async fn failed_step_is_repaired_during_run() {
        let provider = Arc::new(ScriptedProvider::texts(&[PLAN, "done"]));
        let weather = Arc::new(MockTool::responding("weather_lookup", weather_for).failing_first(2));
        let (orch, _) = orchestrator(
            provider,
            vec![
                Arc::new(MockTool::new("github_search", repos_output())) as Arc<dyn Tool>,
                weather.clone(),
            ],
        );

        let report = orch.run("repos and weather").await.unwrap();
        assert_eq!(report.failed(), 0);
        assert_eq!(report.repaired, vec![StepId::Original(2)]);
        assert_eq!(report.results[1].output().unwrap()["city"], "London");
        assert_eq!(weather.calls(), 3);
    }

    #[tokio::test]
    async fn planner_failure_aborts_run_before_execution() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout("slow".into()))]));
        let tool = Arc::new(MockTool::new("github_search", json!([])));
        let (orch, _) = orchestrator(provider.clone(), vec![tool.clone() as Arc<dyn Tool>]);

        let err = orch.run("anything").await.unwrap_err();
        assert!(matches!(err, OracleError::Provider(ProviderError::Timeout(_))));
        assert_eq!(tool.calls(), 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn unparseable_plan_is_an_error() {
        let provider = Arc::new(ScriptedProvider::texts(&["Sorry, I can't do that."]));
        let (orch, _) = orchestrator(provider, vec![]);
        assert!(matches!(orch.run("x").await, Err(OracleError::Unparseable { .. })));
    }

    #[tokio::test]
    async fn verifier_failure_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(PLAN.to_string()),
            Err(ProviderError::RateLimited { retry_after_secs: 5 }),
        ]));
        let (orch, _) = orchestrator(
            provider,
            vec![
                Arc::new(MockTool::new("github_search", repos_output())) as Arc<dyn Tool>,
                Arc::new(MockTool::responding("weather_lookup", weather_for)),
            ],
        );
        let err = orch.run("x").await.unwrap_err();
        assert!(matches!(err, OracleError::Provider(ProviderError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn report_serializes() {
        let provider = Arc::new(ScriptedProvider::texts(&["[]", "Nothing to do."]));
        let (orch, _) = orchestrator(provider, vec![]);
        let report = orch.run("nothing").await.unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["task"], "nothing");
        assert_eq!(value["answer"], "Nothing to do.");
        assert!(value["results"].as_array().unwrap().is_empty());
    }
}
