//! Event handling between the host, the weather client and the wearable.
//!
//! The host feeds three events in: the app became ready, the wearable asked for fresh
//! data, and the settings window closed. Each ends with zero or more messages on the
//! [`DeviceLink`] and possibly a background fetch, whose [`FetchHandle`] is returned.

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    cache::WeatherCache,
    client::{FetchHandle, WeatherClient},
    device::DeviceLink,
    location::{self, LocationError, LocationOptions, LocationProvider},
    model::{AppMessage, CachedWeatherReading, Icon, Position, Temperature, WeatherMessage},
    provider::{Query, WeatherProvider},
    settings::{Settings, SettingsStore},
    store::KeyValueStore,
    units::{format_temperature, format_time, format_wind},
};

const DEGREE: char = '\u{00B0}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Cached readings younger than this are reused at startup.
    pub freshness: TimeDelta,
    pub location: LocationOptions,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            freshness: TimeDelta::minutes(60),
            location: LocationOptions::default(),
        }
    }
}

#[derive(Debug)]
struct BridgeState {
    settings: RwLock<Settings>,
    settings_store: SettingsStore,
    cache: WeatherCache,
    client: WeatherClient,
    location: Arc<dyn LocationProvider>,
    link: Arc<dyn DeviceLink>,
    options: BridgeOptions,
}

#[derive(Debug, Clone)]
pub struct Bridge {
    state: Arc<BridgeState>,
}

impl Bridge {
    /// Build a bridge over `store`. Settings are loaded immediately.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn WeatherProvider>,
        location: Arc<dyn LocationProvider>,
        link: Arc<dyn DeviceLink>,
        options: BridgeOptions,
    ) -> Self {
        let settings_store = SettingsStore::new(Arc::clone(&store));
        let cache = WeatherCache::new(store);
        let client = WeatherClient::new(provider, cache.clone());

        Self {
            state: Arc::new(BridgeState {
                settings: RwLock::new(settings_store.load()),
                settings_store,
                cache,
                client,
                location,
                link,
                options,
            }),
        }
    }

    pub fn settings(&self) -> Settings {
        self.state.settings.read().clone()
    }

    /// Startup: mirror settings, then reuse a fresh cache or fetch.
    pub async fn on_ready(&self) -> Option<FetchHandle> {
        self.on_ready_at(Utc::now()).await
    }

    pub async fn on_ready_at(&self, now: DateTime<Utc>) -> Option<FetchHandle> {
        let settings = self.state.settings_store.load();
        *self.state.settings.write() = settings;
        self.mirror_settings();

        let fetched_at = self.state.cache.fetched_at();
        if is_fresh(now, fetched_at, self.state.options.freshness) {
            info!("Within refresh limit, sending cached data");
            self.read_cached_data();
            return None;
        }

        self.refresh().await
    }

    /// The wearable asked for fresh data.
    pub async fn on_app_message(&self) -> Option<FetchHandle> {
        self.refresh().await
    }

    /// The settings window closed with `payload` (possibly empty when cancelled).
    pub async fn on_settings_closed(&self, payload: &str) -> Option<FetchHandle> {
        match Settings::parse(payload) {
            Ok(Some(settings)) => {
                info!(city = %settings.set_city, "Applying new settings");
                if let Err(e) = self.state.settings_store.save(&settings) {
                    warn!(error = %e, "Failed to persist settings");
                }
                *self.state.settings.write() = settings;
            }
            Ok(None) => debug!("Settings window closed without changes"),
            Err(e) => warn!(error = %e, "Ignoring malformed settings payload"),
        }

        self.mirror_settings();
        self.refresh().await
    }

    /// Format whatever the cache holds and send it to the wearable.
    pub fn read_cached_data(&self) {
        let message = self.cached_message(&Local);
        self.emit(AppMessage::Weather(message));
    }

    pub fn cached_message<Tz: TimeZone>(&self, tz: &Tz) -> WeatherMessage {
        let reading = self.state.cache.reading();
        let settings = self.state.settings.read();
        format_reading(&reading, &settings, tz)
    }

    pub fn location_success(&self, position: Position) -> FetchHandle {
        self.fetch_weather(Query::Coordinates(position))
    }

    /// Fall back to the last known location, or tell the wearable there is no GPS.
    pub fn location_error(&self, err: &LocationError) -> Option<FetchHandle> {
        debug!(error = %err, "Location fix failed");
        match self.state.cache.last_location() {
            Some(position) => Some(self.fetch_weather(Query::Coordinates(position))),
            None => {
                info!("No location available");
                self.emit(AppMessage::Weather(WeatherMessage::no_gps()));
                None
            }
        }
    }

    /// Start a fetch; the cached reading is sent once the forecast has been handled.
    pub fn fetch_weather(&self, query: Query) -> FetchHandle {
        let bridge = self.clone();
        self.state
            .client
            .fetch_weather(query, move || bridge.read_cached_data())
    }

    async fn refresh(&self) -> Option<FetchHandle> {
        let city_query = {
            let settings = self.state.settings.read();
            settings
                .city()
                .map(|city| Query::for_city(city, settings.city_id))
        };

        match city_query {
            Some(query) => {
                info!(%query, "Loading weather for configured city");
                Some(self.fetch_weather(query))
            }
            None => {
                info!("Loading weather from device location");
                self.request_location().await
            }
        }
    }

    async fn request_location(&self) -> Option<FetchHandle> {
        let options = self.state.options.location;
        match location::locate(self.state.location.as_ref(), &options).await {
            Ok(position) => Some(self.location_success(position)),
            Err(err) => self.location_error(&err),
        }
    }

    fn mirror_settings(&self) {
        let mirror = self.state.settings.read().mirror();
        self.emit(AppMessage::Config(mirror));
    }

    fn emit(&self, message: AppMessage) {
        if let Err(e) = self.state.link.send(message) {
            warn!(error = %e, "Failed to send message to wearable");
        }
    }
}

/// True when `fetched_at` lies less than `window` before `now`, counted in whole minutes.
pub fn is_fresh(now: DateTime<Utc>, fetched_at: Option<i64>, window: TimeDelta) -> bool {
    let Some(fetched_at) = fetched_at else {
        return false;
    };
    let elapsed = now.timestamp().div_euclid(60) - fetched_at.div_euclid(60);
    elapsed < window.num_minutes()
}

/// Build the wearable weather message from a cached reading.
pub fn format_reading<Tz: TimeZone>(
    reading: &CachedWeatherReading,
    settings: &Settings,
    tz: &Tz,
) -> WeatherMessage {
    if reading.fetched_at.is_none() {
        return WeatherMessage::no_data();
    }

    let units = settings.units();
    let clock = settings.clock();
    let temp = |t: Option<Temperature>| format_temperature(t.unwrap_or(Temperature::Unavailable), units);
    let time = |t: Option<i64>| t.map(|t| format_time(t, tz, clock)).unwrap_or_default();

    WeatherMessage {
        icon: reading.icon.unwrap_or(Icon::Unknown),
        temperature: format!("{}{DEGREE}", temp(reading.temperature)),
        city: reading.city.clone().unwrap_or_default(),
        sun_times: format!("{}\n{}", time(reading.sunrise), time(reading.sunset)),
        forecast_icon: reading.forecast_icon.unwrap_or(Icon::Unknown),
        min_max_temperature: format!("{}-{}{DEGREE}", temp(reading.min_temp), temp(reading.max_temp)),
        misc: Some(
            reading
                .wind_speed_mps
                .map(|mps| format_wind(mps, units))
                .unwrap_or_default(),
        ),
    }
}
