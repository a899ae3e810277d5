//! Cache-through tool wrapper.

use crate::store::ToolCache;
use async_trait::async_trait;
use opsassist_core::error::ToolError;
use opsassist_core::tool::Tool;
use std::sync::Arc;
use tracing::debug;

/// Wraps a tool so identical invocations within the TTL hit the cache.
///
/// Only successful outputs are stored. Concurrent misses on the same key may
/// each invoke the inner tool; the last writer wins.
pub struct CachingTool {
    inner: Arc<dyn Tool>,
    cache: Arc<ToolCache>,
}

impl CachingTool {
    pub fn new(inner: Arc<dyn Tool>, cache: Arc<ToolCache>) -> Self {
        Self { inner, cache }
    }

    /// Wrap `inner` if it is cacheable, otherwise return it unchanged.
    pub fn wrap(inner: Arc<dyn Tool>, cache: Arc<ToolCache>) -> Arc<dyn Tool> {
        if inner.cacheable() {
            Arc::new(Self::new(inner, cache))
        } else {
            inner
        }
    }
}

#[async_trait]
impl Tool for CachingTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }

    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let name = self.inner.name();

        if let Some(hit) = self.cache.get(name, &input) {
            debug!(tool = name, "Cache hit");
            return Ok(hit);
        }

        debug!(tool = name, "Cache miss, invoking tool");
        let output = self.inner.execute(input.clone()).await?;
        self.cache.set(name, &input, output.clone());
        Ok(output)
    }

    fn cacheable(&self) -> bool {
        true
    }
}
