//! Typed view of the weather fields and last known location kept in the durable store.

use anyhow::Result;
use std::sync::Arc;

use crate::{
    model::{CachedWeatherReading, CurrentConditions, ForecastSummary, Icon, Position, Temperature},
    store::{KeyValueStore, keys},
};

pub const NO_DATA_CITY: &str = "no data";

#[derive(Debug, Clone)]
pub struct WeatherCache {
    store: Arc<dyn KeyValueStore>,
}

impl WeatherCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn record_location(&self, position: Position) -> Result<()> {
        self.store.set(keys::LATITUDE, &position.latitude.to_string())?;
        self.store.set(keys::LONGITUDE, &position.longitude.to_string())?;
        Ok(())
    }

    pub fn last_location(&self) -> Option<Position> {
        let latitude = self.number(keys::LATITUDE)?;
        let longitude = self.number(keys::LONGITUDE)?;
        Some(Position::new(latitude, longitude))
    }

    /// Overwrite the current-conditions fields one by one.
    pub fn write_current(&self, current: &CurrentConditions) -> Result<()> {
        self.set_icon(keys::ICON, current.icon)?;
        self.store.set(
            keys::TEMPERATURE,
            &Temperature::Kelvin(current.temperature_k).to_stored(),
        )?;
        self.store.set(keys::WIND_SPEED, &current.wind_speed_mps.to_string())?;
        self.store.set(keys::CITY, &current.city)?;
        self.store.set(keys::SUNRISE, &current.sunrise.to_string())?;
        self.store.set(keys::SUNSET, &current.sunset.to_string())?;
        self.store.set(keys::WEATHER_TIMESTAMP, &current.observed_at.to_string())?;
        Ok(())
    }

    /// Provider had no data for the query. Wind and sun times keep their previous values.
    pub fn write_current_not_found(&self) -> Result<()> {
        self.store.set(keys::TEMPERATURE, Temperature::SENTINEL)?;
        self.store.set(keys::CITY, NO_DATA_CITY)?;
        self.set_icon(keys::ICON, Icon::Unknown)
    }

    pub fn write_forecast(&self, forecast: &ForecastSummary) -> Result<()> {
        self.store.set(
            keys::MIN_TEMP,
            &Temperature::Kelvin(forecast.min_temp_k).to_stored(),
        )?;
        self.store.set(
            keys::MAX_TEMP,
            &Temperature::Kelvin(forecast.max_temp_k).to_stored(),
        )?;
        self.set_icon(keys::FORECAST_ICON, forecast.icon)
    }

    pub fn write_forecast_not_found(&self) -> Result<()> {
        self.set_icon(keys::FORECAST_ICON, Icon::Unknown)
    }

    pub fn fetched_at(&self) -> Option<i64> {
        self.integer(keys::WEATHER_TIMESTAMP)
    }

    pub fn reading(&self) -> CachedWeatherReading {
        CachedWeatherReading {
            icon: self.icon(keys::ICON),
            temperature: self.temperature(keys::TEMPERATURE),
            wind_speed_mps: self.number(keys::WIND_SPEED),
            city: self.store.get(keys::CITY),
            sunrise: self.integer(keys::SUNRISE),
            sunset: self.integer(keys::SUNSET),
            fetched_at: self.fetched_at(),
            forecast_icon: self.icon(keys::FORECAST_ICON),
            min_temp: self.temperature(keys::MIN_TEMP),
            max_temp: self.temperature(keys::MAX_TEMP),
        }
    }

    fn set_icon(&self, key: &str, icon: Icon) -> Result<()> {
        self.store.set(key, &u8::from(icon).to_string())
    }

    fn icon(&self, key: &str) -> Option<Icon> {
        let code = self.number(key)?.floor();
        let icon = u8::try_from(code as i64)
            .ok()
            .and_then(|code| Icon::try_from(code).ok())
            .unwrap_or(Icon::Unknown);
        Some(icon)
    }

    fn temperature(&self, key: &str) -> Option<Temperature> {
        self.store.get(key).map(|raw| Temperature::from_stored(&raw))
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.store.get(key)?.trim().parse().ok()
    }

    fn integer(&self, key: &str) -> Option<i64> {
        let raw = self.store.get(key)?;
        let raw = raw.trim();
        raw.parse::<i64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|v| v as i64))
    }
}
