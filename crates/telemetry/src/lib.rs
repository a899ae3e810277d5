//! LLM usage and cost tracking for OpsAssist.
//!
//! The [`CostTracker`] is the orchestrator's usage sink: every planner and
//! verifier call is recorded with estimated token counts, priced from the
//! built-in [`PricingTable`], and summarized per caller and per provider.
//! Free-tier models report how much of their monthly allowance is used.

pub mod model;
pub mod pricing;
pub mod tracker;

pub use model::{CostReport, CostSummary, FreeTierStatus, LlmCall};
pub use pricing::{ModelPricing, PricingMatch, PricingTable};
pub use tracker::CostTracker;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
