use crate::{
    Config,
    model::{CurrentConditions, ForecastSummary, Position},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// How a request addresses its location.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    CityName(String),
    CityId(String),
    Coordinates(Position),
}

impl Query {
    /// `by_id` selects between a numeric OpenWeather city id and a free-text name.
    pub fn for_city(city: &str, by_id: bool) -> Self {
        if by_id {
            Query::CityId(city.to_string())
        } else {
            Query::CityName(city.to_string())
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Query::CityName(name) => vec![("q", name.clone())],
            Query::CityId(id) => vec![("id", id.clone())],
            Query::Coordinates(pos) => vec![
                ("lat", pos.latitude.to_string()),
                ("lon", pos.longitude.to_string()),
            ],
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::CityName(name) => write!(f, "city '{name}'"),
            Query::CityId(id) => write!(f, "city id {id}"),
            Query::Coordinates(pos) => write!(f, "{},{}", pos.latitude, pos.longitude),
        }
    }
}

/// Provider answer that distinguishes "no such place" from real data.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, query: &Query) -> anyhow::Result<Lookup<CurrentConditions>>;

    async fn forecast(&self, query: &Query) -> anyhow::Result<Lookup<ForecastSummary>>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for OpenWeather.\n\
                 Hint: run `techrad configure` and enter your API key."
        )
    })?;

    Ok(Arc::new(OpenWeatherProvider::with_base_url(
        api_key,
        config.base_url(),
    )?))
}
