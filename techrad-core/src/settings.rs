//! User-facing watchface settings: defaults, persistence, the subset mirrored to the
//! wearable, and the offline settings form.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    model::ConfigMirror,
    store::{KeyValueStore, keys},
    units::{ClockFormat, UnitSystem},
};

/// Placeholder some settings pages write instead of leaving the city empty.
const UNDEFINED_CITY: &str = "undefined";

/// Watchface configuration, stored as one JSON blob with `CONFIG_*` keys and 0/1 flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// White background layout.
    #[serde(rename = "CONFIG_REVERSE", with = "flag")]
    pub reverse: bool,
    #[serde(rename = "CONFIG_COLORTICKS", with = "flag")]
    pub color_ticks: bool,
    #[serde(rename = "CONFIG_24H", with = "flag")]
    pub clock_24h: bool,
    #[serde(rename = "CONFIG_SECONDS", with = "flag")]
    pub seconds: bool,
    #[serde(rename = "CONFIG_HOURVIBES", with = "flag")]
    pub hour_vibes: bool,
    /// Fahrenheit and mph instead of Celsius and km/h.
    #[serde(rename = "CONFIG_FAHRENHEIT", with = "flag")]
    pub fahrenheit: bool,
    /// Treat `set_city` as an OpenWeather city id rather than a name.
    #[serde(rename = "CONFIG_CITYID", with = "flag")]
    pub city_id: bool,
    /// Empty means "use GPS".
    #[serde(rename = "CONFIG_SETCITY", deserialize_with = "string_or_null")]
    pub set_city: String,
    /// Distance walked instead of step count.
    #[serde(rename = "CONFIG_DISTANCE", with = "flag")]
    pub distance: bool,
    #[serde(rename = "CONFIG_BLUETHEME", with = "flag")]
    pub blue_theme: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reverse: false,
            color_ticks: true,
            clock_24h: true,
            seconds: true,
            hour_vibes: false,
            fahrenheit: false,
            city_id: false,
            set_city: String::new(),
            distance: true,
            blue_theme: false,
        }
    }
}

impl Settings {
    /// Parse a settings blob. Blank input yields `None`; missing keys take their defaults.
    pub fn parse(blob: &str) -> Result<Option<Self>> {
        if blob.trim().is_empty() {
            return Ok(None);
        }
        let settings = serde_json::from_str(blob).context("Failed to parse settings JSON")?;
        Ok(Some(settings))
    }

    pub fn units(&self) -> UnitSystem {
        if self.fahrenheit {
            UnitSystem::Imperial
        } else {
            UnitSystem::Metric
        }
    }

    pub fn clock(&self) -> ClockFormat {
        if self.clock_24h {
            ClockFormat::TwentyFourHour
        } else {
            ClockFormat::TwelveHour
        }
    }

    /// The configured city, if any.
    pub fn city(&self) -> Option<&str> {
        let city = self.set_city.trim();
        (!city.is_empty() && city != UNDEFINED_CITY).then_some(city)
    }

    /// Fields the watch renders with. Units and city only matter on the host.
    pub fn mirror(&self) -> ConfigMirror {
        ConfigMirror {
            reverse: self.reverse.into(),
            color_ticks: self.color_ticks.into(),
            seconds: self.seconds.into(),
            hour_vibes: self.hour_vibes.into(),
            distance: self.distance.into(),
            blue_theme: self.blue_theme.into(),
        }
    }
}

/// Loads and saves [`Settings`] under the `techradconfig` key.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Never fails: absent, blank or unparsable blobs fall back to the defaults.
    pub fn load(&self) -> Settings {
        let Some(blob) = self.store.get(keys::CONFIG) else {
            return Settings::default();
        };

        match Settings::parse(&blob) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored settings unreadable, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let blob = serde_json::to_string(settings).context("Failed to serialize settings")?;
        self.store.set(keys::CONFIG, &blob)
    }
}

/// Offline settings form, pre-filled with `settings`. Submitting it navigates to
/// `pebblejs://close#<settings JSON>`, which the host hands back as the closed-window payload.
pub fn render_page(settings: &Settings) -> String {
    let checkboxes = [
        ("CONFIG_REVERSE", settings.reverse, "Reversed layout with white background<br>(default is black background)"),
        ("CONFIG_BLUETHEME", settings.blue_theme, "Blue theme for graphics<br>(default is red)"),
        ("CONFIG_COLORTICKS", settings.color_ticks, "Coloured hour ticks"),
        ("CONFIG_24H", settings.clock_24h, "24 hour time<br>(default is 12 hour am/pm time)"),
        ("CONFIG_SECONDS", settings.seconds, "Show second hand"),
        ("CONFIG_HOURVIBES", settings.hour_vibes, "Vibrate at the start of every hour"),
        ("CONFIG_FAHRENHEIT", settings.fahrenheit, "Use Fahrenheit for temperature and mph for windspeed<br>(default is Centigrade and km/h)"),
        ("CONFIG_DISTANCE", settings.distance, "Show distance walked<br>(default is no. of steps walked)"),
        ("CONFIG_CITYID", settings.city_id, "Use OpenWeathermap city ID<br>(default is to search for city name)"),
    ];

    let mut fields = String::new();
    let mut script_fields = String::new();
    for (id, checked, label) in checkboxes {
        let checked = if checked { " checked" } else { "" };
        fields.push_str(&format!(
            "<p><input type=\"checkbox\" id=\"{id}\"{checked}><label for=\"{id}\">{label}</label></p>\n"
        ));
        script_fields.push_str(&format!(
            "o[\"{id}\"]=document.getElementById(\"{id}\").checked?1:0;"
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html><head><meta name="viewport" content="width=device-width, initial-scale=1"><title>TechRad</title></head>
<body><header><h1>TechRad</h1></header>
<form onsubmit="return s(this)">
{fields}<p><input type="text" id="CONFIG_SETCITY" value="{city}"><label for="CONFIG_SETCITY"><br>Set city name or city ID (leave empty to use GPS)</label></p>
<p><input type="submit" value="Save Settings"></p>
</form>
<script>function s(e){{var o={{}};{script_fields}o["CONFIG_SETCITY"]=document.getElementById("CONFIG_SETCITY").value;window.location.href="pebblejs://close#"+JSON.stringify(o);return false;}}</script>
</body></html>
"#,
        city = escape_html(&settings.set_city),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Flags are 0/1 on the wire; booleans and "1"/"0" strings are accepted on read.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => b,
            Raw::Int(n) => n != 0,
            Raw::Float(n) => n != 0.0,
            Raw::Text(s) => matches!(s.trim(), "1" | "true" | "on"),
        })
    }
}
