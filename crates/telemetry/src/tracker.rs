//! The cost tracker: records oracle calls and aggregates them.

use crate::TelemetryError;
use crate::model::{CostReport, CostSummary, FreeTierStatus, LlmCall};
use crate::pricing::PricingTable;
use chrono::Utc;
use opsassist_core::usage::{CallerCategory, UsageSink};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// Thread-safe usage sink that prices every tracked call.
///
/// Token counts are estimated from text length (about four characters per
/// token), so costs are approximations.
pub struct CostTracker {
    pricing: PricingTable,
    calls: RwLock<Vec<LlmCall>>,
}

impl CostTracker {
    /// Create a tracker with built-in pricing.
    pub fn new() -> Self {
        Self::with_pricing(PricingTable::with_defaults())
    }

    /// Create a tracker with custom pricing.
    pub fn with_pricing(pricing: PricingTable) -> Self {
        Self {
            pricing,
            calls: RwLock::new(Vec::new()),
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Rough token estimate: one token per four characters.
    pub fn estimate_tokens(text: &str) -> u32 {
        (text.chars().count() / 4) as u32
    }

    /// Record a call with known token counts.
    pub fn record(
        &self,
        model: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        caller: CallerCategory,
    ) -> LlmCall {
        let call = LlmCall {
            timestamp: Utc::now(),
            model: model.to_string(),
            provider: self.pricing.detect_provider(model),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd: self
                .pricing
                .compute_cost(model, prompt_tokens, completion_tokens),
            caller,
        };

        debug!(
            model = %call.model,
            provider = %call.provider,
            caller = %caller,
            tokens = call.total_tokens,
            cost_usd = call.cost_usd,
            "Tracked LLM call"
        );

        self.calls.write().unwrap().push(call.clone());
        call
    }

    /// Snapshot of every recorded call, oldest first.
    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn total_cost(&self) -> f64 {
        self.calls.read().unwrap().iter().map(|c| c.cost_usd).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(|c| c.total_tokens as u64)
            .sum()
    }

    /// Aggregate all recorded calls.
    ///
    /// Free-tier status is reported for the first recorded call whose model
    /// is free-tier with a known monthly limit, against the total token count.
    pub fn summary(&self) -> CostSummary {
        let calls = self.calls.read().unwrap();

        let total_calls = calls.len();
        let total_tokens: u64 = calls.iter().map(|c| c.total_tokens as u64).sum();
        let total_cost_usd: f64 = calls.iter().map(|c| c.cost_usd).sum();

        let mut cost_by_caller = BTreeMap::new();
        let mut cost_by_provider = BTreeMap::new();
        for call in calls.iter() {
            *cost_by_caller.entry(call.caller.to_string()).or_insert(0.0) += call.cost_usd;
            *cost_by_provider.entry(call.provider.clone()).or_insert(0.0) += call.cost_usd;
        }

        let free_tier_status = calls.iter().find_map(|call| {
            let m = self.pricing.lookup(&call.model)?;
            (m.pricing.free_tier && m.pricing.monthly_limit > 0).then(|| {
                FreeTierStatus::new(
                    call.provider.clone(),
                    call.model.clone(),
                    total_tokens,
                    m.pricing.monthly_limit,
                )
            })
        });

        CostSummary {
            total_calls,
            total_tokens,
            total_cost_usd,
            cost_by_caller,
            cost_by_provider,
            average_cost_per_call: if total_calls == 0 {
                0.0
            } else {
                total_cost_usd / total_calls as f64
            },
            free_tier_status,
        }
    }

    /// The summary plus every recorded call.
    pub fn report(&self) -> CostReport {
        CostReport {
            summary: self.summary(),
            detailed_calls: self.calls(),
        }
    }

    /// Write [`CostTracker::report`] as pretty JSON.
    pub fn save_report(&self, path: &Path) -> Result<(), TelemetryError> {
        let json = serde_json::to_string_pretty(&self.report())?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Cost report saved");
        Ok(())
    }

    /// Drop all recorded calls.
    pub fn reset(&self) {
        self.calls.write().unwrap().clear();
        debug!("Cost tracking reset");
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageSink for CostTracker {
    fn track_call(&self, model: &str, prompt: &str, response: &str, caller: CallerCategory) {
        self.record(
            model,
            Self::estimate_tokens(prompt),
            Self::estimate_tokens(response),
            caller,
        );
    }
}
