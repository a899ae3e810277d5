//! Configuration loading, validation, and management for OpsAssist.
//!
//! Loads configuration from `~/.opsassist/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.opsassist/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature for oracle calls
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per oracle response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Step execution: retry policy and worker pool
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Tool result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Built-in tool credentials and endpoints
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Cost tracking and reporting
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_provider() -> String {
    "google".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("executor", &self.executor)
            .field("cache", &self.cache)
            .field("tools", &self.tools)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Retry policy and worker pool settings for plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Attempts per tool invocation, including the first (>= 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay; attempt `n` waits `base * 2^n` plus jitter
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the uniform random jitter added to each backoff
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,

    /// Maximum steps of one plan executing at the same time
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Optional deadline for a single tool attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_jitter_ms() -> u64 {
    1000
}
fn default_max_workers() -> usize {
    4
}

impl ExecutorConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            max_workers: default_max_workers(),
            attempt_timeout_secs: None,
        }
    }
}

/// Tool result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TTL for tools without an explicit entry in `tool_ttl_secs`
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Per-tool TTL overrides (tool name → seconds), layered over the built-ins
    #[serde(default = "default_tool_ttls", deserialize_with = "merge_tool_ttls")]
    pub tool_ttl_secs: HashMap<String, u64>,
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_tool_ttls() -> HashMap<String, u64> {
    HashMap::from([
        ("github_search".to_string(), 600),
        ("weather_lookup".to_string(), 300),
    ])
}

fn merge_tool_ttls<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<String, u64>, D::Error> {
    let overrides = HashMap::<String, u64>::deserialize(deserializer)?;
    let mut ttls = default_tool_ttls();
    ttls.extend(overrides);
    Ok(ttls)
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Resolve the TTL for a tool.
    pub fn ttl_for(&self, tool_name: &str) -> Duration {
        self.tool_ttl_secs
            .get(tool_name)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or_else(|| self.default_ttl())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: default_ttl_secs(),
            tool_ttl_secs: default_tool_ttls(),
        }
    }
}

/// Credentials and endpoints for the built-in tools.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Repositories returned per search
    #[serde(default = "default_github_result_limit")]
    pub github_result_limit: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openweather_api_key: Option<String>,

    #[serde(default = "default_weather_api_url")]
    pub weather_api_url: String,

    /// HTTP timeout for a single tool request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_github_result_limit() -> usize {
    3
}
fn default_weather_api_url() -> String {
    "https://api.openweathermap.org/data/2.5".into()
}
fn default_http_timeout_secs() -> u64 {
    30
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("github_token", &redact(&self.github_token))
            .field("github_api_url", &self.github_api_url)
            .field("github_result_limit", &self.github_result_limit)
            .field("openweather_api_key", &redact(&self.openweather_api_key))
            .field("weather_api_url", &self.weather_api_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api_url: default_github_api_url(),
            github_result_limit: default_github_result_limit(),
            openweather_api_key: None,
            weather_api_url: default_weather_api_url(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Cost tracking and reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether oracle calls are tracked
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Where `opsassist run` writes the cost report
    #[serde(default = "default_report_path")]
    pub report_path: String,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_report_path() -> String {
    "cost_report.json".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_path: default_report_path(),
            custom_pricing: HashMap::new(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
    /// Whether the model has a free tier
    #[serde(default)]
    pub free_tier: bool,
    /// Free-tier tokens per month (0 = no limit known)
    #[serde(default)]
    pub monthly_limit: u64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.opsassist/config.toml).
    ///
    /// Also checks environment variables, see [`AppConfig::apply_env_overrides`].
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (highest priority).
    ///
    /// - `OPSASSIST_API_KEY`, then `GOOGLE_API_KEY`, then `OPENAI_API_KEY`
    ///   (only when no key is configured)
    /// - `OPSASSIST_PROVIDER`, `OPSASSIST_MODEL`
    /// - `GITHUB_TOKEN`, `OPENWEATHER_API_KEY`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("OPSASSIST_API_KEY")
                .or_else(|| lookup("GOOGLE_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("OPSASSIST_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("OPSASSIST_MODEL") {
            self.default_model = model;
        }

        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.tools.github_token = Some(token);
        }

        if let Some(key) = lookup("OPENWEATHER_API_KEY") {
            self.tools.openweather_api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".opsassist")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.executor.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "executor.max_attempts must be at least 1".into(),
            ));
        }

        if self.executor.max_workers == 0 {
            return Err(ConfigError::ValidationError(
                "executor.max_workers must be at least 1".into(),
            ));
        }

        if self.tools.github_result_limit == 0 {
            return Err(ConfigError::ValidationError(
                "tools.github_result_limit must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an LLM API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `opsassist config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            executor: ExecutorConfig::default(),
            cache: CacheConfig::default(),
            tools: ToolsConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
