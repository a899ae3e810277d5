//! Usage sink: where oracle calls report their metadata.
//!
//! The orchestrator never reads anything back from the sink; pricing and
//! reporting are entirely the sink's concern.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which oracle made an LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerCategory {
    Planner,
    Verifier,
}

impl fmt::Display for CallerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planner => write!(f, "planner"),
            Self::Verifier => write!(f, "verifier"),
        }
    }
}

/// Receives `(model, prompt, response, caller)` for every oracle call.
pub trait UsageSink: Send + Sync {
    fn track_call(&self, model: &str, prompt: &str, response: &str, caller: CallerCategory);
}

/// A sink that discards everything.
pub struct NoopUsageSink;

impl UsageSink for NoopUsageSink {
    fn track_call(&self, _model: &str, _prompt: &str, _response: &str, _caller: CallerCategory) {}
}
