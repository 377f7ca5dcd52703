//! get_weather tool - Current conditions from OpenWeatherMap

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        "get_weather"
    }

    fn description(&self) -> &'static str {
        "Get current weather for a city"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("location", ParamKind::String, "City name, e.g. 'Warsaw' or 'London,UK'").required(),
        ])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let location = args.str("location")?.trim();
        if location.is_empty() {
            return Err(ToolError::InvalidArguments("location must not be empty".to_string()));
        }

        let key_name = &ctx.limits.weather_api_key;
        let api_key = ctx
            .credentials
            .lookup(key_name)
            .ok_or_else(|| ToolError::MissingCredential { name: key_name.clone() })?;

        let client = reqwest::Client::builder()
            .timeout(ctx.limits.weather_timeout)
            .build()
            .map_err(|e| ToolError::Http(e.to_string()))?;

        log::debug!("Weather lookup for '{}'", location);
        let response = client
            .get(&ctx.limits.weather_url)
            .query(&[("q", location), ("appid", api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        after: ctx.limits.weather_timeout,
                    }
                } else {
                    ToolError::Http(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Http(format!("weather service returned {}", status)));
        }

        let body: Value = response.json().await.map_err(|e| ToolError::Http(e.to_string()))?;
        parse_weather(&body)
    }
}

/// Map an OpenWeatherMap response to the tool payload
fn parse_weather(body: &Value) -> Result<Value, ToolError> {
    let missing = |field: &str| ToolError::Http(format!("weather response missing '{}'", field));
    let main = body.get("main").ok_or_else(|| missing("main"))?;

    Ok(json!({
        "location": body.get("name").and_then(Value::as_str).ok_or_else(|| missing("name"))?,
        "country": body.pointer("/sys/country").and_then(Value::as_str),
        "temperature": main.get("temp").and_then(Value::as_f64).ok_or_else(|| missing("main.temp"))?,
        "feels_like": main.get("feels_like").and_then(Value::as_f64),
        "humidity": main.get("humidity").and_then(Value::as_f64),
        "pressure": main.get("pressure").and_then(Value::as_f64),
        "description": body.pointer("/weather/0/description").and_then(Value::as_str),
        "wind_speed": body.pointer("/wind/speed").and_then(Value::as_f64),
        "visibility_km": body.get("visibility").and_then(Value::as_f64).unwrap_or(0.0) / 1000.0,
    }))
}
