//! Built-in tool implementations for OpsAssist.
//!
//! Tools give a plan the ability to act: search GitHub for popular
//! repositories and look up the current weather for a city.

pub mod github_search;
mod http;
pub mod weather_lookup;

use opsassist_cache::{CachingTool, ToolCache, TtlPolicy};
use opsassist_config::AppConfig;
use opsassist_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;

pub use github_search::GithubSearchTool;
pub use weather_lookup::WeatherLookupTool;

/// Build the tool cache described by `config.cache`.
pub fn build_cache(config: &AppConfig) -> Arc<ToolCache> {
    Arc::new(ToolCache::new(TtlPolicy::from(&config.cache)))
}

/// Create the default tool registry with all built-in tools.
///
/// When caching is enabled every cacheable tool is registered behind a
/// [`CachingTool`] sharing `cache`.
pub fn default_registry(config: &AppConfig, cache: Arc<ToolCache>) -> ToolRegistry {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(GithubSearchTool::from_config(&config.tools)),
        Arc::new(WeatherLookupTool::from_config(&config.tools)),
    ];

    let mut registry = ToolRegistry::new();
    for tool in tools {
        let tool = if config.cache.enabled {
            CachingTool::wrap(tool, cache.clone())
        } else {
            tool
        };
        registry.register(tool);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtin_tools() {
        let config = AppConfig::default();
        let registry = default_registry(&config, build_cache(&config));
        assert_eq!(registry.names(), vec!["github_search", "weather_lookup"]);
    }

    #[test]
    fn definitions_survive_cache_wrapping() {
        let config = AppConfig::default();
        let registry = default_registry(&config, build_cache(&config));
        let defs = registry.definitions();
        assert!(defs[0].description.contains("GitHub"));
        assert_eq!(defs[1].parameters["required"][0], "city");
    }

    #[test]
    fn cache_ttls_follow_config() {
        let mut config = AppConfig::default();
        config.cache.tool_ttl_secs.insert("weather_lookup".into(), 42);
        let cache = build_cache(&config);
        assert_eq!(
            cache.policy().ttl_for("weather_lookup"),
            std::time::Duration::from_secs(42)
        );
    }
}
