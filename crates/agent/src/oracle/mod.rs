//! LLM-backed oracles: the planner that turns a task into steps and the
//! verifier that turns results into the final answer.

mod planner;
mod verifier;

pub use planner::{Planner, parse_plan};
pub use verifier::Verifier;

use opsassist_config::AppConfig;
use opsassist_core::error::OracleError;
use opsassist_core::message::Message;
use opsassist_core::provider::{Provider, ProviderRequest};
use opsassist_core::usage::{CallerCategory, NoopUsageSink, UsageSink};
use std::sync::Arc;
use tracing::debug;

/// Thin client over a [`Provider`] shared by both oracles.
///
/// Every call is reported to the usage sink with the full prompt and
/// response text, whether or not the response turns out to be usable.
#[derive(Clone)]
pub struct OracleClient {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    usage: Arc<dyn UsageSink>,
}

impl OracleClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            usage: Arc::new(NoopUsageSink),
        }
    }

    /// Build a client for the configured default provider.
    ///
    /// A `default_model` in the provider's own section wins over the
    /// top-level one.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        Self::new(provider, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(Some(config.default_max_tokens))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_usage(mut self, usage: Arc<dyn UsageSink>) -> Self {
        self.usage = usage;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send a system + user exchange and return the response text.
    pub async fn ask(
        &self,
        system: &str,
        user: &str,
        caller: CallerCategory,
    ) -> Result<String, OracleError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            caller = %caller,
            "Sending oracle request"
        );

        let response = self.provider.complete(request).await?;
        let text = response.message.content.trim().to_string();

        let prompt = format!("{system}\n\n{user}");
        self.usage.track_call(&self.model, &prompt, &text, caller);

        if text.is_empty() {
            return Err(OracleError::EmptyResponse { caller });
        }
        Ok(text)
    }
}
