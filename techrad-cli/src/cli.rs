use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use std::path::PathBuf;
use techrad_core::{Config, Position, Query, SettingsStore, settings};

use crate::host::{self, Host};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "techrad", version, about = "TechRad weather bridge")]
pub struct Cli {
    /// Directory for the durable key/value store (defaults to the platform data dir).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the OpenWeather API key and an optional fixed location.
    Configure,

    /// Run the bridge: host events on stdin, wearable messages on stdout.
    Run {
        /// Latitude of this host, used as its location fix.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude of this host.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Fetch once, wait for both responses and print the resulting messages.
    Fetch {
        /// City name, or OpenWeather city id with --by-id.
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        city: Option<String>,

        #[arg(long, requires = "city")]
        by_id: bool,

        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Print the settings form, pre-filled with the stored settings.
    SettingsPage,
}

fn position(lat: Option<f64>, lon: Option<f64>) -> Option<Position> {
    lat.zip(lon).map(|(lat, lon)| Position::new(lat, lon))
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Run { lat, lon } => {
                let config = Config::load()?;
                let host = Host::new(&config, self.data_dir, position(lat, lon))?;
                host.run().await
            }
            Command::Fetch {
                city,
                by_id,
                lat,
                lon,
            } => {
                let config = Config::load()?;
                let host = Host::new(&config, self.data_dir, None)?;
                let query = match (city, position(lat, lon)) {
                    (Some(city), _) => Some(Query::for_city(&city, by_id)),
                    (None, Some(pos)) => Some(Query::Coordinates(pos)),
                    (None, None) => None,
                };
                host.fetch_once(query).await
            }
            Command::SettingsPage => {
                let store = host::open_store(self.data_dir)?;
                let current = SettingsStore::new(store).load();
                println!("{}", settings::render_page(&current));
                Ok(())
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    let current = config
        .fixed_position()
        .map(|p| format!("{},{}", p.latitude, p.longitude))
        .unwrap_or_default();
    let location = Text::new("Fixed location as 'lat,lon' (empty for none):")
        .with_initial_value(&current)
        .prompt()
        .context("Failed to read location")?;
    config.set_fixed_position(parse_position(&location)?);

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn parse_position(raw: &str) -> Result<Option<Position>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let (lat, lon) = raw
        .split_once(',')
        .with_context(|| format!("Expected 'lat,lon', got '{raw}'"))?;
    let lat = lat.trim().parse().with_context(|| format!("Invalid latitude '{lat}'"))?;
    let lon = lon.trim().parse().with_context(|| format!("Invalid longitude '{lon}'"))?;
    Ok(Some(Position::new(lat, lon)))
}
