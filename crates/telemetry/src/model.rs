//! Data model for recorded oracle calls and cost summaries.

use chrono::{DateTime, Utc};
use opsassist_core::usage::CallerCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One tracked LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCall {
    /// When the call was recorded.
    pub timestamp: DateTime<Utc>,
    /// Model name as reported by the caller.
    pub model: String,
    /// Provider detected from the model name.
    pub provider: String,
    /// Estimated prompt tokens.
    pub prompt_tokens: u32,
    /// Estimated completion tokens.
    pub completion_tokens: u32,
    /// Prompt plus completion tokens.
    pub total_tokens: u32,
    /// Estimated cost in USD.
    pub cost_usd: f64,
    /// Which oracle made the call.
    pub caller: CallerCategory,
}

/// Aggregated usage across every tracked call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_calls: usize,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    /// Cost keyed by caller (`planner`, `verifier`).
    pub cost_by_caller: BTreeMap<String, f64>,
    /// Cost keyed by provider (`google`, `openai`, ...).
    pub cost_by_provider: BTreeMap<String, f64>,
    pub average_cost_per_call: f64,
    /// Present when a free-tier model with a monthly limit was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_tier_status: Option<FreeTierStatus>,
}

/// Monthly allowance usage of a free-tier model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeTierStatus {
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub monthly_limit: u64,
    pub monthly_usage_percent: f64,
    pub within_free_tier: bool,
}

impl FreeTierStatus {
    pub fn new(provider: String, model: String, tokens_used: u64, monthly_limit: u64) -> Self {
        Self {
            provider,
            model,
            tokens_used,
            monthly_limit,
            monthly_usage_percent: tokens_used as f64 / monthly_limit as f64 * 100.0,
            within_free_tier: tokens_used < monthly_limit,
        }
    }
}

/// The JSON document written by [`crate::CostTracker::save_report`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    #[serde(flatten)]
    pub summary: CostSummary,
    pub detailed_calls: Vec<LlmCall>,
}
