//! Plan scheduler: runs every step of a plan on a bounded worker pool.

use crate::executor::StepExecutor;
use opsassist_core::plan::{ExecutionResult, Step};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Dispatches plan steps to the [`StepExecutor`].
///
/// The worker pool is a semaphore sized at construction and shared by every
/// plan this scheduler runs. Steps are independent; one failing never stops
/// its siblings.
pub struct PlanScheduler {
    executor: Arc<StepExecutor>,
    workers: Arc<Semaphore>,
    max_workers: usize,
}

impl PlanScheduler {
    pub fn new(executor: Arc<StepExecutor>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            executor,
            workers: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn executor(&self) -> &Arc<StepExecutor> {
        &self.executor
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Execute all steps and return exactly one result per step, sorted by
    /// step id.
    pub async fn execute_plan(&self, steps: Vec<Step>) -> Vec<ExecutionResult> {
        let mut results = if steps.len() <= 1 {
            self.run_inline(&steps).await
        } else {
            self.run_parallel(&steps).await
        };

        results.sort_by_key(|r| r.step_id);
        results
    }

    async fn run_inline(&self, steps: &[Step]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            results.push(self.executor.execute(step).await);
        }
        results
    }

    async fn run_parallel(&self, steps: &[Step]) -> Vec<ExecutionResult> {
        info!(
            steps = steps.len(),
            workers = self.max_workers.min(steps.len()),
            "Executing plan in parallel"
        );

        let mut set = JoinSet::new();
        for step in steps.iter().cloned() {
            let executor = self.executor.clone();
            let workers = self.workers.clone();
            set.spawn(async move {
                let _permit = match workers.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ExecutionResult::failed(&step, "worker pool closed"),
                };
                executor.execute(&step).await
            });
        }

        let mut results = Vec::with_capacity(steps.len());
        let mut worker_errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    debug!(step_id = %result.step_id, success = result.is_success(), "Step completed");
                    results.push(result);
                }
                Err(e) => {
                    error!(error = %e, "Step worker died");
                    worker_errors.push(e.to_string());
                }
            }
        }

        // A worker that died left no result behind; report its step as failed.
        if !worker_errors.is_empty() {
            let reason = format!("worker task failed: {}", worker_errors.join("; "));
            for step in steps {
                if !results.iter().any(|r| r.step_id == step.id) {
                    results.push(ExecutionResult::failed(step, reason.clone()));
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::test_helpers::*;
    use opsassist_core::plan::StepId;
    use opsassist_core::tool::Tool;
    use serde_json::json;
    use std::time::Duration;

    fn scheduler(tools: Vec<Arc<dyn Tool>>, workers: usize) -> PlanScheduler {
        let executor = StepExecutor::new(registry(tools), RetryPolicy::immediate(3));
        PlanScheduler::new(Arc::new(executor), workers)
    }

    #[tokio::test]
    async fn empty_plan_yields_no_results() {
        let sched = scheduler(vec![], 4);
        assert!(sched.execute_plan(vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn single_step_runs_inline() {
        let tool = Arc::new(MockTool::new("t", json!("ok")));
        let sched = scheduler(vec![tool.clone() as Arc<dyn Tool>], 4);
        let results = sched.execute_plan(vec![Step::new(7, "one").with_tool("t")]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].step_id, StepId::Original(7));
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn results_sorted_regardless_of_completion_order() {
        let slow = Arc::new(MockTool::new("slow", json!("slow")).with_delay(Duration::from_secs(5)));
        let fast = Arc::new(MockTool::new("fast", json!("fast")));
        let sched = scheduler(vec![slow as Arc<dyn Tool>, fast], 4);

        let steps = vec![
            Step::new(3, "fast c").with_tool("fast"),
            Step::new(1, "slow a").with_tool("slow"),
            Step::new(2, "fast b").with_tool("fast"),
        ];
        let results = sched.execute_plan(steps).await;

        let ids: Vec<StepId> = results.iter().map(|r| r.step_id).collect();
        assert_eq!(ids, vec![StepId::Original(1), StepId::Original(2), StepId::Original(3)]);
        assert_eq!(results[0].output(), Some(&json!("slow")));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_pool_size() {
        let tool = Arc::new(MockTool::new("t", json!(1)).with_delay(Duration::from_millis(100)));
        let sched = scheduler(vec![tool.clone() as Arc<dyn Tool>], 2);

        let steps = (1..=6).map(|i| Step::new(i, "work").with_tool("t")).collect();
        let results = sched.execute_plan(steps).await;

        assert_eq!(results.len(), 6);
        assert_eq!(tool.calls(), 6);
        assert_eq!(tool.peak_concurrency(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pool_is_bounded_by_step_count() {
        let tool = Arc::new(MockTool::new("t", json!(1)).with_delay(Duration::from_millis(100)));
        let sched = scheduler(vec![tool.clone() as Arc<dyn Tool>], 4);

        let steps = (1..=3).map(|i| Step::new(i, "work").with_tool("t")).collect();
        sched.execute_plan(steps).await;
        assert_eq!(tool.peak_concurrency(), 3);
    }

    #[tokio::test]
    async fn partial_failure_keeps_siblings() {
        let ok = Arc::new(MockTool::new("ok", json!("fine")));
        let broken = Arc::new(MockTool::new("broken", json!(null)).always_failing());
        let sched = scheduler(vec![ok as Arc<dyn Tool>, broken.clone()], 4);

        let results = sched
            .execute_plan(vec![
                Step::new(1, "a").with_tool("ok"),
                Step::new(2, "b").with_tool("broken"),
                Step::new(3, "c").with_tool("ok"),
            ])
            .await;

        let statuses: Vec<bool> = results.iter().map(|r| r.is_success()).collect();
        assert_eq!(statuses, vec![true, false, true]);
        assert_eq!(broken.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_does_not_hold_up_siblings() {
        let ok = Arc::new(MockTool::new("ok", json!("fine")));
        let broken = Arc::new(MockTool::new("broken", json!(null)).always_failing());
        let policy = RetryPolicy::new(2, Duration::from_secs(10), Duration::ZERO);
        let executor = StepExecutor::new(registry(vec![ok.clone() as Arc<dyn Tool>, broken.clone()]), policy);
        let sched = PlanScheduler::new(Arc::new(executor), 2);

        let start = tokio::time::Instant::now();
        let plan = sched.execute_plan(vec![
            Step::new(1, "flaky").with_tool("broken"),
            Step::new(2, "steady").with_tool("ok"),
        ]);
        let during_backoff = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            (ok.calls(), broken.calls())
        };
        let (results, (ok_calls, broken_calls)) = tokio::join!(plan, during_backoff);

        assert_eq!(ok_calls, 1);
        assert_eq!(broken_calls, 1);
        assert_eq!(broken.calls(), 2);
        assert!(start.elapsed() >= Duration::from_secs(10));

        let statuses: Vec<bool> = results.iter().map(|r| r.is_success()).collect();
        assert_eq!(statuses, vec![false, true]);
    }

    #[tokio::test]
    async fn panicking_worker_reported_as_failed() {
        let ok = Arc::new(MockTool::new("ok", json!("fine")));
        let sched = scheduler(vec![ok as Arc<dyn Tool>, Arc::new(PanicTool)], 4);

        let results = sched
            .execute_plan(vec![
                Step::new(1, "a").with_tool("ok"),
                Step::new(2, "b").with_tool("panic_tool"),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_success());
        assert!(results[1].is_failed());
        assert!(results[1].error().unwrap().contains("worker task failed"));
    }

    #[tokio::test]
    async fn inline_and_parallel_paths_agree() {
        let tool = Arc::new(MockTool::responding("echo", |input| json!({ "echo": input })));
        let sched = scheduler(vec![tool as Arc<dyn Tool>], 4);

        let step = Step::new(1, "echo").with_tool("echo").with_input("x");
        let inline = sched.execute_plan(vec![step.clone()]).await;
        let parallel = sched
            .execute_plan(vec![step, Step::new(2, "echo").with_tool("echo").with_input("y")])
            .await;

        assert_eq!(inline[0], parallel[0]);
    }

    #[tokio::test]
    async fn pool_is_reused_across_plans() {
        let tool = Arc::new(MockTool::new("t", json!(1)));
        let sched = scheduler(vec![tool.clone() as Arc<dyn Tool>], 2);
        for _ in 0..3 {
            let steps = (1..=4).map(|i| Step::new(i, "w").with_tool("t")).collect();
            assert_eq!(sched.execute_plan(steps).await.len(), 4);
        }
        assert_eq!(tool.calls(), 12);
        assert_eq!(sched.max_workers(), 2);
    }
}
