//! The key → entry store.

use crate::key::CacheKey;
use opsassist_config::CacheConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Per-tool time-to-live settings.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    pub default_ttl: Duration,
    pub per_tool: HashMap<String, Duration>,
}

impl TtlPolicy {
    /// Same TTL for every tool.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            default_ttl: ttl,
            per_tool: HashMap::new(),
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>, ttl: Duration) -> Self {
        self.per_tool.insert(tool_name.into(), ttl);
        self
    }

    pub fn ttl_for(&self, tool_name: &str) -> Duration {
        self.per_tool
            .get(tool_name)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

impl From<&CacheConfig> for TtlPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            default_ttl: config.default_ttl(),
            per_tool: config
                .tool_ttl_secs
                .iter()
                .map(|(name, secs)| (name.clone(), Duration::from_secs(*secs)))
                .collect(),
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

struct CacheEntry {
    value: Value,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

/// Thread-safe TTL cache of tool outputs.
///
/// Shared by every worker of a plan; a single mutex guards the map. There is
/// no size-based eviction.
pub struct ToolCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    policy: TtlPolicy,
}

impl ToolCache {
    pub fn new(policy: TtlPolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Look up a fresh value. Expired entries are removed on the way out.
    pub fn get(&self, tool_name: &str, args: &Value) -> Option<Value> {
        let key = CacheKey::derive(tool_name, args);
        let mut entries = self.entries.lock().unwrap();

        let expired = match entries.get(&key) {
            None => return None,
            Some(entry) => entry.is_expired(Instant::now()),
        };

        if expired {
            entries.remove(&key);
            debug!(tool = tool_name, key = %key, "Cache entry expired");
            return None;
        }

        entries.get(&key).map(|entry| entry.value.clone())
    }

    /// Store a value under the tool's TTL, replacing any previous entry.
    pub fn set(&self, tool_name: &str, args: &Value, value: Value) {
        let key = CacheKey::derive(tool_name, args);
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl: self.policy.ttl_for(tool_name),
        };
        self.entries.lock().unwrap().insert(key, entry);
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Number of stored entries, including ones not yet found to be stale.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::new(TtlPolicy::default())
    }
}
