//! Core library for the TechRad weather bridge.
//!
//! This crate defines:
//! - Unit conversion and message formatting for the watchface
//! - The OpenWeather client and its durable cache
//! - Watchface settings (defaults, persistence, mirroring)
//! - The [`Bridge`] that reacts to host events and talks to the wearable
//!
//! It is used by `techrad-cli`, but can also be embedded in other hosts.

pub mod bridge;
pub mod cache;
pub mod client;
pub mod config;
pub mod device;
pub mod location;
pub mod model;
pub mod provider;
pub mod settings;
pub mod store;
pub mod units;

pub use bridge::{Bridge, BridgeOptions};
pub use cache::WeatherCache;
pub use client::{FetchHandle, WeatherClient};
pub use config::Config;
pub use device::{ChannelLink, DeviceLink, LinkError};
pub use location::{FixedLocation, LocationError, LocationOptions, LocationProvider, NoLocation};
pub use model::{AppMessage, ConfigMirror, Icon, Position, WeatherMessage};
pub use provider::{Query, WeatherProvider, openweather::OpenWeatherProvider};
pub use settings::{Settings, SettingsStore};
pub use store::{FileStore, KeyValueStore, MemoryStore};
