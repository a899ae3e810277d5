//! Plan execution engine and orchestration for OpsAssist.
//!
//! A run follows a **Plan → Execute → Repair → Answer** pipeline:
//!
//! 1. **Plan**: the planning oracle turns a task into independent steps
//! 2. **Execute**: the [`PlanScheduler`] runs the steps on a bounded worker
//!    pool; each step goes through the [`StepExecutor`] with retry and backoff
//! 3. **Repair**: the [`RepairLoop`] validates outputs and re-runs failed
//!    steps once with conservative fallback inputs
//! 4. **Answer**: the verification oracle formats the final answer
//!
//! Step failures never abort a run. Only oracle failures do.

pub mod executor;
pub mod oracle;
pub mod orchestrator;
pub mod repair;
pub mod retry;
pub mod scheduler;
pub mod schema;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use executor::StepExecutor;
pub use oracle::{OracleClient, Planner, Verifier};
pub use orchestrator::{Orchestrator, RunReport};
pub use repair::{RepairLoop, RepairOutcome};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use scheduler::PlanScheduler;
pub use schema::{IssueKind, SchemaIssue};
