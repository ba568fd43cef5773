use serde::{Deserialize, Serialize};

/// Icon shown on the watchface, as understood by the wearable firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum Icon {
    Cloudy = 0,
    Clear = 1,
    Rain = 2,
    Snow = 3,
    #[default]
    Unknown = 4,
}

impl From<Icon> for u8 {
    fn from(icon: Icon) -> Self {
        icon as u8
    }
}

impl TryFrom<u8> for Icon {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Icon::Cloudy),
            1 => Ok(Icon::Clear),
            2 => Ok(Icon::Rain),
            3 => Ok(Icon::Snow),
            4 => Ok(Icon::Unknown),
            other => Err(format!("invalid icon code {other}")),
        }
    }
}

/// Geographic position from a location fix or from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A temperature as cached: raw Kelvin, or the "-" placeholder written after a not-found response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Temperature {
    Kelvin(f64),
    Unavailable,
}

impl Temperature {
    pub const SENTINEL: &'static str = "-";

    pub fn from_stored(raw: &str) -> Self {
        if raw == Self::SENTINEL {
            return Temperature::Unavailable;
        }
        raw.trim()
            .parse()
            .map(Temperature::Kelvin)
            .unwrap_or(Temperature::Unavailable)
    }

    pub fn to_stored(&self) -> String {
        match self {
            Temperature::Kelvin(k) => k.to_string(),
            Temperature::Unavailable => Self::SENTINEL.to_string(),
        }
    }
}

/// Parsed "current conditions" response.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub icon: Icon,
    pub temperature_k: f64,
    pub wind_speed_mps: f64,
    pub city: String,
    pub sunrise: i64,
    pub sunset: i64,
    pub observed_at: i64,
}

/// Reduced short-range forecast: extremes over the requested entries plus the first entry's icon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSummary {
    pub icon: Icon,
    pub min_temp_k: f64,
    pub max_temp_k: f64,
}

/// Everything the cache knows about the last reading. All fields are absent until the first fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CachedWeatherReading {
    pub icon: Option<Icon>,
    pub temperature: Option<Temperature>,
    pub wind_speed_mps: Option<f64>,
    pub city: Option<String>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
    pub fetched_at: Option<i64>,
    pub forecast_icon: Option<Icon>,
    pub min_temp: Option<Temperature>,
    pub max_temp: Option<Temperature>,
}

/// Weather payload pushed to the wearable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherMessage {
    #[serde(rename = "WEATHER_ICON")]
    pub icon: Icon,
    #[serde(rename = "WEATHER_TEMPERATURE")]
    pub temperature: String,
    #[serde(rename = "WEATHER_CITY")]
    pub city: String,
    #[serde(rename = "WEATHER_SUNTIMES")]
    pub sun_times: String,
    #[serde(rename = "WEATHER_FORECASTICON")]
    pub forecast_icon: Icon,
    #[serde(rename = "WEATHER_MINMAXTEMP")]
    pub min_max_temperature: String,
    #[serde(rename = "WEATHER_MISC", default, skip_serializing_if = "Option::is_none")]
    pub misc: Option<String>,
}

impl WeatherMessage {
    /// Sent when nothing has ever been fetched.
    pub fn no_data() -> Self {
        Self::placeholder("", "no data")
    }

    /// Sent when no location fix exists and none was ever cached.
    pub fn no_gps() -> Self {
        Self::placeholder("GPS", "no GPS")
    }

    fn placeholder(temperature: &str, city: &str) -> Self {
        Self {
            icon: Icon::Unknown,
            temperature: temperature.to_string(),
            city: city.to_string(),
            sun_times: String::new(),
            forecast_icon: Icon::Unknown,
            min_max_temperature: String::new(),
            misc: None,
        }
    }
}

/// Subset of the settings the watchface needs for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMirror {
    #[serde(rename = "CONFIG_REVERSE")]
    pub reverse: u8,
    #[serde(rename = "CONFIG_COLORTICKS")]
    pub color_ticks: u8,
    #[serde(rename = "CONFIG_SECONDS")]
    pub seconds: u8,
    #[serde(rename = "CONFIG_HOURVIBES")]
    pub hour_vibes: u8,
    #[serde(rename = "CONFIG_DISTANCE")]
    pub distance: u8,
    #[serde(rename = "CONFIG_BLUETHEME")]
    pub blue_theme: u8,
}

/// Any message sent over the wearable channel. Serialized as a flat key/value dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppMessage {
    Weather(WeatherMessage),
    Config(ConfigMirror),
}
