//! Current weather lookup via OpenWeatherMap.

use crate::http;
use async_trait::async_trait;
use opsassist_config::ToolsConfig;
use opsassist_core::error::ToolError;
use opsassist_core::tool::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

const TOOL_NAME: &str = "weather_lookup";

pub struct WeatherLookupTool {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl WeatherLookupTool {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        let timeout_secs = 30;
        Self {
            client: http::build_client(timeout_secs),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout_secs,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            client: http::build_client(config.http_timeout_secs),
            api_url: config.weather_api_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
            timeout_secs: config.http_timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Look up current weather for a city. Returns city, temperature in °C, and conditions."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, e.g. \"London\""
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let city = parse_city(&input)?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: "OPENWEATHER_API_KEY is not configured".into(),
            })?;

        debug!(city = %city, "Looking up weather");

        let request = self
            .client
            .get(format!("{}/weather", self.api_url))
            .query(&[("q", city.as_str()), ("appid", api_key), ("units", "metric")]);

        let body = http::fetch_json(request, TOOL_NAME, self.timeout_secs).await?;
        parse_weather(&body)
    }
}

/// Accept a bare city string or `{"city"}` (`"location"` also works).
fn parse_city(input: &Value) -> Result<String, ToolError> {
    let city = match input {
        Value::String(c) => c.as_str(),
        Value::Object(map) => map
            .get("city")
            .or_else(|| map.get("location"))
            .and_then(Value::as_str)
            .unwrap_or_default(),
        _ => "",
    };

    let city = city.trim();
    if city.is_empty() {
        return Err(ToolError::InvalidArguments(
            "weather_lookup requires a non-empty 'city'".into(),
        ));
    }
    Ok(city.to_string())
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    name: String,
    main: MainBlock,
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    description: String,
}

/// Reduce an OpenWeatherMap body to `{city, temp_c, condition}`.
pub fn parse_weather(body: &Value) -> Result<Value, ToolError> {
    let response: WeatherResponse =
        serde_json::from_value(body.clone()).map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: format!("unexpected weather response: {e}"),
        })?;

    let condition = response
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: "weather response has no conditions".into(),
        })?;

    Ok(json!({
        "city": response.name,
        "temp_c": response.main.temp,
        "condition": condition,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openweather_body() {
        let body = json!({
            "name": "Paris",
            "main": {"temp": 18.4, "humidity": 60},
            "weather": [{"main": "Clouds", "description": "scattered clouds"}]
        });
        let weather = parse_weather(&body).unwrap();
        assert_eq!(weather["city"], "Paris");
        assert_eq!(weather["temp_c"], 18.4);
        assert_eq!(weather["condition"], "scattered clouds");
    }

    #[test]
    fn missing_conditions_is_failure() {
        let body = json!({"name": "Paris", "main": {"temp": 1.0}, "weather": []});
        assert!(parse_weather(&body).is_err());
    }

    #[test]
    fn error_body_is_failure() {
        let body = json!({"cod": "404", "message": "city not found"});
        let err = parse_weather(&body).unwrap_err();
        assert!(err.to_string().contains("weather_lookup"));
    }

    #[test]
    fn city_input_forms() {
        assert_eq!(parse_city(&json!("London")).unwrap(), "London");
        assert_eq!(parse_city(&json!({"city": " Oslo "})).unwrap(), "Oslo");
        assert_eq!(parse_city(&json!({"location": "Tokyo"})).unwrap(), "Tokyo");
        assert!(matches!(
            parse_city(&json!({})),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let tool = WeatherLookupTool::new("http://127.0.0.1:9", None);
        let err = tool.execute(json!("London")).await.unwrap_err();
        assert!(err.to_string().contains("OPENWEATHER_API_KEY"));
    }
}
