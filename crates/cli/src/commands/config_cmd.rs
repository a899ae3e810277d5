//! `opsassist config` — Configuration management commands.

use opsassist_config::AppConfig;

const REDACTED: &str = "***";

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No LLM API key set (set GOOGLE_API_KEY or OPSASSIST_API_KEY)");
            }
            if config.tools.openweather_api_key.is_none() {
                warnings.push("No OpenWeather key set; weather_lookup steps will fail");
            }
            if config.tools.github_token.is_none() {
                warnings.push("No GitHub token set; repository search is heavily rate limited");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            let router = opsassist_providers::build_from_config(&config);
            println!("   Provider:  {}", config.default_provider);
            println!("   Available: {}", router.list().join(", "));
            println!("   Model:     {}", config.default_model);
            println!(
                "   Executor:  {} attempts, {} workers",
                config.executor.max_attempts, config.executor.max_workers
            );
            println!(
                "   Cache:     {} (default TTL {}s)",
                if config.cache.enabled { "enabled" } else { "disabled" },
                config.cache.default_ttl_secs
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run init.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("   1. Set GOOGLE_API_KEY (or add api_key to the config)");
    println!("   2. Set OPENWEATHER_API_KEY and optionally GITHUB_TOKEN");
    println!("   3. Run: opsassist run \"find popular rust repos and the weather in Tokyo\"");
    Ok(())
}

fn redacted(mut config: AppConfig) -> AppConfig {
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some(REDACTED.to_string());
        }
    };
    mask(&mut config.api_key);
    mask(&mut config.tools.github_token);
    mask(&mut config.tools.openweather_api_key);
    for provider in config.providers.values_mut() {
        mask(&mut provider.api_key);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("AIza-secret".into());
        config.tools.openweather_api_key = Some("owm-secret".into());

        let text = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains(REDACTED));
    }
}
