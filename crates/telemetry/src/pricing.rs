//! Built-in pricing table for the models OpsAssist can talk to.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price, and free-tier models carry a monthly token allowance.
//! Custom pricing can be added from the `[telemetry.custom_pricing]` config.

use opsassist_config::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Providers tried when a bare model name has no exact entry.
const KNOWN_PROVIDERS: [&str; 3] = ["google", "openai", "anthropic"];

/// Model-name fragments that identify a provider.
const PROVIDER_PATTERNS: [(&str, &str); 3] =
    [("gemini", "google"), ("gpt", "openai"), ("claude", "anthropic")];

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
    /// Whether usage falls under a free tier.
    #[serde(default)]
    pub free_tier: bool,
    /// Free-tier tokens per month (0 = unknown / unlimited).
    #[serde(default)]
    pub monthly_limit: u64,
}

impl ModelPricing {
    /// Create a new paid pricing entry.
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
            free_tier: false,
            monthly_limit: 0,
        }
    }

    /// A zero-cost entry with a monthly token allowance.
    pub fn free(monthly_limit: u64) -> Self {
        Self {
            input_per_m: 0.0,
            output_per_m: 0.0,
            free_tier: true,
            monthly_limit,
        }
    }

    /// Rate applied to models missing from the table.
    pub fn fallback() -> Self {
        Self::new(0.001, 0.002)
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// A resolved table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingMatch {
    /// Table key, e.g. `google/gemini-2.5-flash`.
    pub key: String,
    /// Provider owning the entry.
    pub provider: String,
    pub pricing: ModelPricing,
}

/// Thread-safe pricing table with built-in defaults and custom overrides.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── Google ─────────────────────────────────────────────────
        prices.insert(
            "google/gemini-2.5-flash".into(),
            ModelPricing::free(15_000_000),
        );
        prices.insert("google/gemini-pro".into(), ModelPricing::new(0.25, 0.50));
        prices.insert(
            "google/gemini-1.5-flash".into(),
            ModelPricing::new(0.075, 0.15),
        );

        // ── OpenAI ─────────────────────────────────────────────────
        prices.insert("openai/gpt-4".into(), ModelPricing::new(0.03, 0.06));
        prices.insert("openai/gpt-4-turbo".into(), ModelPricing::new(0.01, 0.03));
        prices.insert(
            "openai/gpt-3.5-turbo".into(),
            ModelPricing::new(0.0015, 0.002),
        );

        // ── Anthropic ──────────────────────────────────────────────
        prices.insert(
            "anthropic/claude-3-opus".into(),
            ModelPricing::new(0.015, 0.075),
        );
        prices.insert(
            "anthropic/claude-3-sonnet".into(),
            ModelPricing::new(0.003, 0.015),
        );
        prices.insert(
            "anthropic/claude-3-haiku".into(),
            ModelPricing::new(0.00025, 0.00125),
        );

        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Built-in prices plus the overrides from `[telemetry.custom_pricing]`.
    pub fn from_config(config: &TelemetryConfig) -> Self {
        let table = Self::with_defaults();
        for (model, custom) in &config.custom_pricing {
            table.set(
                model.clone(),
                ModelPricing {
                    input_per_m: custom.input_per_m,
                    output_per_m: custom.output_per_m,
                    free_tier: custom.free_tier,
                    monthly_limit: custom.monthly_limit,
                },
            );
        }
        table
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Look up pricing by exact key.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.prices.read().unwrap();
        prices.get(model).cloned()
    }

    /// Add or update pricing for a model.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        let mut prices = self.prices.write().unwrap();
        prices.insert(model.into(), pricing);
    }

    /// Resolve the entry that prices `model`.
    ///
    /// Tries an exact match first, then the known provider prefixes
    /// (`gpt-4` → `openai/gpt-4`), then the longest table entry whose bare
    /// name occurs inside the model name (`models/gemini-2.5-flash-001`
    /// matches `gemini-2.5-flash`).
    pub fn lookup(&self, model: &str) -> Option<PricingMatch> {
        let prices = self.prices.read().unwrap();
        let found = |key: &str, pricing: &ModelPricing| PricingMatch {
            key: key.to_string(),
            provider: provider_of_key(key),
            pricing: pricing.clone(),
        };

        // 1. Exact match
        if let Some(p) = prices.get(model) {
            return Some(found(model, p));
        }

        // 2. Known provider prefixes
        for provider in KNOWN_PROVIDERS {
            let name = format!("{provider}/{model}");
            if let Some(p) = prices.get(&name) {
                return Some(found(&name, p));
            }
        }

        // 3. Longest contained bare name
        let model_lower = model.to_lowercase();
        let mut best: Option<(&str, &ModelPricing)> = None;
        for (key, pricing) in prices.iter() {
            let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
            if model_lower.contains(&bare_key)
                && best.is_none_or(|(k, _)| bare_key.len() > bare_len(k))
            {
                best = Some((key.as_str(), pricing));
            }
        }

        best.map(|(key, p)| found(key, p))
    }

    /// Compute cost for a model call; unknown models use [`ModelPricing::fallback`].
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.lookup(model)
            .map(|m| m.pricing)
            .unwrap_or_else(ModelPricing::fallback)
            .cost(input_tokens, output_tokens)
    }

    /// Provider for a model: from its table entry, else from name patterns,
    /// else `"unknown"`.
    pub fn detect_provider(&self, model: &str) -> String {
        if let Some(m) = self.lookup(model) {
            return m.provider;
        }
        provider_from_patterns(model)
            .unwrap_or("unknown")
            .to_string()
    }

    /// List all known model names.
    pub fn models(&self) -> Vec<String> {
        let prices = self.prices.read().unwrap();
        let mut names: Vec<String> = prices.keys().cloned().collect();
        names.sort();
        names
    }

    /// All entries, sorted by key.
    pub fn entries(&self) -> Vec<(String, ModelPricing)> {
        let prices = self.prices.read().unwrap();
        let mut entries: Vec<(String, ModelPricing)> =
            prices.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.prices.read().unwrap().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn bare_len(key: &str) -> usize {
    key.rsplit('/').next().unwrap_or(key).len()
}

fn provider_of_key(key: &str) -> String {
    match key.split_once('/') {
        Some((provider, _)) => provider.to_string(),
        None => provider_from_patterns(key).unwrap_or("unknown").to_string(),
    }
}

fn provider_from_patterns(model: &str) -> Option<&'static str> {
    let model = model.to_lowercase();
    PROVIDER_PATTERNS
        .iter()
        .find(|(pattern, _)| model.contains(pattern))
        .map(|(_, provider)| *provider)
}
