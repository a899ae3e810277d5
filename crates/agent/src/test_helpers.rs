//! Shared test doubles for executor, scheduler, repair, and oracle tests.

use async_trait::async_trait;
use opsassist_core::error::{ProviderError, ToolError};
use opsassist_core::message::Message;
use opsassist_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use opsassist_core::tool::{Tool, ToolRegistry};
use opsassist_core::usage::{CallerCategory, UsageSink};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn Fn(&Value) -> Value + Send + Sync>;

/// A scriptable tool: fails its first `fail_first` calls, optionally sleeps,
/// and tracks call count and peak concurrency.
pub struct MockTool {
    name: String,
    respond: Responder,
    fail_first: usize,
    delay: Duration,
    calls: Mutex<usize>,
    in_flight: Mutex<usize>,
    peak: Mutex<usize>,
    inputs: Mutex<Vec<Value>>,
}

impl MockTool {
    pub fn new(name: &str, output: Value) -> Self {
        Self::responding(name, move |_| output.clone())
    }

    pub fn responding(name: &str, respond: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self {
            name: name.to_string(),
            respond: Box::new(respond),
            fail_first: 0,
            delay: Duration::ZERO,
            calls: Mutex::new(0),
            in_flight: Mutex::new(0),
            peak: Mutex::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.fail_first = failures;
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing_first(usize::MAX)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn peak_concurrency(&self) -> usize {
        *self.peak.lock().unwrap()
    }

    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Mock tool"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "string"})
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        self.inputs.lock().unwrap().push(input.clone());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            *in_flight += 1;
            let mut peak = self.peak.lock().unwrap();
            *peak = (*peak).max(*in_flight);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        *self.in_flight.lock().unwrap() -= 1;

        if call_number <= self.fail_first {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: format!("call {call_number} failed"),
            });
        }
        Ok((self.respond)(&input))
    }
}

/// A tool whose worker always panics.
pub struct PanicTool;

#[async_trait]
impl Tool for PanicTool {
    fn name(&self) -> &str {
        "panic_tool"
    }
    fn description(&self) -> &str {
        "Panics"
    }
    fn parameters_schema(&self) -> Value {
        json!({})
    }
    async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
        panic!("tool exploded");
    }
}

pub fn registry(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    Arc::new(registry)
}

/// A well-formed repository search output.
pub fn repos_output() -> Value {
    json!([
        {"name": "org/alpha", "stars": 900, "description": "Alpha"},
        {"name": "org/beta", "stars": 800, "description": "Beta"}
    ])
}

/// Weather output echoing the requested city.
pub fn weather_for(input: &Value) -> Value {
    json!({"city": input.as_str().unwrap_or("?"), "temp_c": 21.5, "condition": "clear sky"})
}

/// A provider that returns scripted results in sequence and records requests.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        if index >= responses.len() {
            panic!(
                "ScriptedProvider: no more responses (call #{index}, have {})",
                responses.len()
            );
        }
        requests.push(request);

        let text = responses[index].clone()?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// A usage sink that remembers every call.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(String, CallerCategory)>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<(String, CallerCategory)> {
        self.calls.lock().unwrap().clone()
    }
}

impl UsageSink for RecordingSink {
    fn track_call(&self, model: &str, _prompt: &str, _response: &str, caller: CallerCategory) {
        self.calls.lock().unwrap().push((model.to_string(), caller));
    }
}
