use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::{
    config::DEFAULT_BASE_URL,
    model::{CurrentConditions, ForecastSummary, Icon},
    units::icon_from_weather_id,
};

use super::{Lookup, Query, WeatherProvider};

/// Number of 3-hour forecast slots reduced into min/max.
pub const FORECAST_ENTRIES: usize = 4;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// GET `endpoint`, returning `None` when a successful body reports an unknown location.
    /// Any non-2xx status is an error regardless of the body.
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &Query,
        count: usize,
    ) -> Result<Option<T>> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut params = query.params();
        params.push(("cnt", count.to_string()));
        params.push(("APPID", self.api_key.clone()));

        let res = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({endpoint})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {endpoint} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {} request failed with status {}: {}",
                endpoint,
                status,
                truncate_body(&body),
            ));
        }

        let json: Value = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse OpenWeather {endpoint} JSON"))?;

        if is_not_found(&json) {
            return Ok(None);
        }

        let parsed = serde_json::from_value(json)
            .with_context(|| format!("Unexpected OpenWeather {endpoint} JSON shape"))?;
        Ok(Some(parsed))
    }
}

/// OpenWeather signals "city not found" with `cod` 404, sent either as a string or a number.
fn is_not_found(body: &Value) -> bool {
    match body.get("cod") {
        Some(Value::String(code)) => code.trim() == "404",
        Some(Value::Number(code)) => code.as_i64() == Some(404),
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

fn first_icon(weather: &[OwWeather]) -> Icon {
    weather
        .first()
        .map(|w| icon_from_weather_id(w.id))
        .unwrap_or(Icon::Unknown)
}

impl From<OwCurrentResponse> for CurrentConditions {
    fn from(parsed: OwCurrentResponse) -> Self {
        CurrentConditions {
            icon: first_icon(&parsed.weather),
            temperature_k: parsed.main.temp,
            wind_speed_mps: parsed.wind.speed,
            city: parsed.name,
            sunrise: parsed.sys.sunrise,
            sunset: parsed.sys.sunset,
            observed_at: parsed.dt,
        }
    }
}

fn summarize_forecast(parsed: &OwForecastResponse) -> Result<ForecastSummary> {
    let entries = &parsed.list[..parsed.list.len().min(FORECAST_ENTRIES)];
    let first = entries
        .first()
        .ok_or_else(|| anyhow!("OpenWeather forecast response contained no data"))?;

    let min_temp_k = entries
        .iter()
        .map(|e| e.main.temp_min)
        .fold(f64::INFINITY, f64::min);
    let max_temp_k = entries
        .iter()
        .map(|e| e.main.temp_max)
        .fold(f64::NEG_INFINITY, f64::max);

    Ok(ForecastSummary {
        icon: first_icon(&first.weather),
        min_temp_k,
        max_temp_k,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, query: &Query) -> Result<Lookup<CurrentConditions>> {
        let parsed: Option<OwCurrentResponse> = self.fetch("weather", query, 1).await?;
        Ok(match parsed {
            Some(parsed) => Lookup::Found(parsed.into()),
            None => Lookup::NotFound,
        })
    }

    async fn forecast(&self, query: &Query) -> Result<Lookup<ForecastSummary>> {
        let parsed: Option<OwForecastResponse> =
            self.fetch("forecast", query, FORECAST_ENTRIES).await?;
        match parsed {
            Some(parsed) => Ok(Lookup::Found(summarize_forecast(&parsed)?)),
            None => Ok(Lookup::NotFound),
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}
