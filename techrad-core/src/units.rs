//! Conversions from provider units (Kelvin, m/s, epoch seconds) to what the watch displays.

use chrono::{DateTime, TimeZone, Timelike};

use crate::model::{Icon, Temperature};

/// Offset used for Kelvin → Celsius. The watchface has always shipped with 272.15.
pub const KELVIN_OFFSET: f64 = 272.15;

const MPS_TO_KMH: f64 = 3600.0 / 1000.0;
const KMH_TO_MPH: f64 = 0.6214;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockFormat {
    TwelveHour,
    #[default]
    TwentyFourHour,
}

/// Map an OpenWeather condition code to a watch icon.
pub fn icon_from_weather_id(id: i64) -> Icon {
    match id {
        i64::MIN..=599 => Icon::Rain,
        600..=699 => Icon::Snow,
        801.. => Icon::Clear,
        _ => Icon::Cloudy,
    }
}

/// Round half up, so 2.5 becomes 3 and -2.5 becomes -2.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

pub fn kelvin_to_display(kelvin: f64, units: UnitSystem) -> i64 {
    let celsius = kelvin - KELVIN_OFFSET;
    match units {
        UnitSystem::Metric => round_half_up(celsius),
        UnitSystem::Imperial => round_half_up(celsius * 9.0 / 5.0 + 32.0),
    }
}

/// Temperature without unit suffix; the placeholder passes through untouched.
pub fn format_temperature(temperature: Temperature, units: UnitSystem) -> String {
    match temperature {
        Temperature::Kelvin(k) => kelvin_to_display(k, units).to_string(),
        Temperature::Unavailable => Temperature::SENTINEL.to_string(),
    }
}

pub fn format_wind(mps: f64, units: UnitSystem) -> String {
    let kmh = mps * MPS_TO_KMH;
    match units {
        UnitSystem::Metric => format!("{} km/h", round_half_up(kmh)),
        UnitSystem::Imperial => format!("{} mph", round_half_up(kmh * KMH_TO_MPH)),
    }
}

/// Local wall-clock time of an epoch timestamp, e.g. "6:07" or "6:07 AM".
pub fn format_time<Tz: TimeZone>(epoch_secs: i64, tz: &Tz, clock: ClockFormat) -> String {
    let Some(utc) = DateTime::from_timestamp(epoch_secs, 0) else {
        return String::new();
    };
    let local = utc.with_timezone(tz);
    let (hour, minute) = (local.hour(), local.minute());

    match clock {
        ClockFormat::TwentyFourHour => format!("{hour}:{minute:02}"),
        ClockFormat::TwelveHour => {
            let suffix = if hour < 12 { "AM" } else { "PM" };
            let hour = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{hour}:{minute:02} {suffix}")
        }
    }
}
