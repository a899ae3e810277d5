//! # OpsAssist Core
//!
//! Domain types, traits, and error definitions for the OpsAssist plan
//! orchestrator. This crate has **no runtime dependencies**; it defines the
//! model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here (tools, LLM providers, usage sinks).
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod plan;
pub mod provider;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use error::{OracleError, ProviderError, ToolError};
pub use message::{Message, Role};
pub use plan::{ActionCategory, ExecutionResult, Step, StepId, StepOutcome};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolRegistry};
pub use usage::{CallerCategory, NoopUsageSink, UsageSink};
