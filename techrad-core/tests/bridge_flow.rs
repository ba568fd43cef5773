//! End-to-end tests of the bridge against a mock OpenWeather server.

use chrono::{TimeDelta, Utc};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use techrad_core::{
    AppMessage, Bridge, BridgeOptions, ChannelLink, FileStore, FixedLocation, Icon,
    LocationProvider, MemoryStore, NoLocation, OpenWeatherProvider, Position, Query, WeatherMessage,
    store::{KeyValueStore, keys},
};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

/// Forecast responses are delayed so they land after the current conditions.
const FORECAST_DELAY: Duration = Duration::from_millis(150);

struct Harness {
    bridge: Bridge,
    store: Arc<MemoryStore>,
    rx: UnboundedReceiver<AppMessage>,
}

impl Harness {
    fn drain(&mut self) -> Vec<AppMessage> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            out.push(message);
        }
        out
    }
}

fn harness(
    server: &MockServer,
    store: Arc<MemoryStore>,
    location: Arc<dyn LocationProvider>,
) -> Harness {
    let provider = Arc::new(
        OpenWeatherProvider::with_base_url(API_KEY.to_string(), &server.uri())
            .expect("client must build"),
    );
    let (link, rx) = ChannelLink::pair();
    let bridge = Bridge::new(
        store.clone(),
        provider,
        location,
        Arc::new(link),
        BridgeOptions::default(),
    );
    Harness { bridge, store, rx }
}

fn store_with_settings(blob: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(keys::CONFIG, blob).unwrap();
    store
}

fn current_body(city: &str, kelvin: f64, condition: i64) -> Value {
    json!({
        "cod": 200,
        "name": city,
        "dt": 1_700_000_000,
        "main": {"temp": kelvin, "humidity": 80},
        "wind": {"speed": 10.0},
        "weather": [{"id": condition, "description": "whatever"}],
        "sys": {"sunrise": 1_699_990_000, "sunset": 1_700_020_000}
    })
}

fn forecast_body(mins: [f64; 4], maxs: [f64; 4], first_condition: i64) -> Value {
    let list: Vec<Value> = mins
        .iter()
        .zip(maxs.iter())
        .enumerate()
        .map(|(i, (min, max))| {
            let id = if i == 0 { first_condition } else { 800 };
            json!({"main": {"temp_min": min, "temp_max": max}, "weather": [{"id": id}]})
        })
        .collect();
    json!({"cod": "200", "cnt": 4, "list": list})
}

async fn mount_city(server: &MockServer, param: &str, value: &str, city: &str) {
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param(param, value))
        .and(query_param("cnt", "1"))
        .and(query_param("APPID", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body(city, 285.15, 500)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param(param, value))
        .and(query_param("cnt", "4"))
        .and(query_param("APPID", API_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body(
                    [281.15, 279.15, 280.15, 282.15],
                    [286.15, 288.15, 287.15, 285.15],
                    601,
                ))
                .set_delay(FORECAST_DELAY),
        )
        .mount(server)
        .await;
}

fn weather_messages(messages: &[AppMessage]) -> Vec<WeatherMessage> {
    messages
        .iter()
        .filter_map(|m| match m {
            AppMessage::Weather(w) => Some(w.clone()),
            AppMessage::Config(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn startup_with_city_fetches_and_emits() {
    let server = MockServer::start().await;
    mount_city(&server, "q", "London", "London").await;

    let mut h = harness(
        &server,
        store_with_settings(r#"{"CONFIG_SETCITY":"London"}"#),
        Arc::new(NoLocation),
    );

    let handle = h.bridge.on_ready().await.expect("stale cache must trigger a fetch");
    handle.join().await;

    let messages = h.drain();
    assert!(matches!(messages.first(), Some(AppMessage::Config(_))));

    let weather = weather_messages(&messages);
    assert_eq!(weather.len(), 1);
    let w = &weather[0];
    assert_eq!(w.icon, Icon::Rain);
    assert_eq!(w.temperature, "13°");
    assert_eq!(w.city, "London");
    assert_eq!(w.forecast_icon, Icon::Snow);
    assert_eq!(w.min_max_temperature, "7-16°");
    assert_eq!(w.misc.as_deref(), Some("36 km/h"));
    assert_eq!(w.sun_times.lines().count(), 2);

    assert_eq!(h.store.get(keys::WEATHER_TIMESTAMP).as_deref(), Some("1700000000"));
}

#[tokio::test]
async fn city_id_mode_uses_id_parameter() {
    let server = MockServer::start().await;
    mount_city(&server, "id", "2643743", "London").await;

    let mut h = harness(
        &server,
        store_with_settings(r#"{"CONFIG_SETCITY":"2643743","CONFIG_CITYID":1}"#),
        Arc::new(NoLocation),
    );

    h.bridge
        .on_app_message()
        .await
        .expect("configured city must trigger a fetch")
        .join()
        .await;

    let weather = weather_messages(&h.drain());
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0].city, "London");
}

#[tokio::test]
async fn gps_fix_fetches_by_coordinates_and_records_location() {
    let server = MockServer::start().await;
    mount_city(&server, "lat", "45.5", "Montreal").await;

    let mut h = harness(
        &server,
        Arc::new(MemoryStore::new()),
        Arc::new(FixedLocation::new(Position::new(45.5, -73.5))),
    );

    h.bridge
        .on_app_message()
        .await
        .expect("location fix must trigger a fetch")
        .join()
        .await;

    let weather = weather_messages(&h.drain());
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0].city, "Montreal");
    assert_eq!(h.store.get(keys::LATITUDE).as_deref(), Some("45.5"));
    assert_eq!(h.store.get(keys::LONGITUDE).as_deref(), Some("-73.5"));
}

#[tokio::test]
async fn location_error_without_history_reports_no_gps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut h = harness(&server, Arc::new(MemoryStore::new()), Arc::new(NoLocation));

    assert!(h.bridge.on_app_message().await.is_none());

    let weather = weather_messages(&h.drain());
    assert_eq!(weather, vec![WeatherMessage::no_gps()]);
}

#[tokio::test]
async fn location_error_falls_back_to_last_known_position() {
    let server = MockServer::start().await;
    mount_city(&server, "lat", "-33.86", "Sydney").await;

    let store = Arc::new(MemoryStore::new());
    store.set(keys::LATITUDE, "-33.86").unwrap();
    store.set(keys::LONGITUDE, "151.2").unwrap();
    let mut h = harness(&server, store, Arc::new(NoLocation));

    h.bridge
        .on_app_message()
        .await
        .expect("cached location must trigger a fetch")
        .join()
        .await;

    let weather = weather_messages(&h.drain());
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0].city, "Sydney");
}

#[tokio::test]
async fn fresh_cache_is_reused_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let now = Utc::now();
    let store = store_with_settings(r#"{"CONFIG_SETCITY":"Paris"}"#);
    let ten_minutes_ago = (now - TimeDelta::minutes(10)).timestamp().to_string();
    store.set(keys::WEATHER_TIMESTAMP, &ten_minutes_ago).unwrap();
    store.set(keys::CITY, "Paris").unwrap();
    store.set(keys::TEMPERATURE, "290.15").unwrap();
    store.set(keys::ICON, "1").unwrap();

    let mut h = harness(&server, store, Arc::new(NoLocation));
    assert!(h.bridge.on_ready_at(now).await.is_none());

    let messages = h.drain();
    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[0], AppMessage::Config(_)));
    let weather = weather_messages(&messages);
    assert_eq!(weather[0].city, "Paris");
    assert_eq!(weather[0].temperature, "18°");
    assert_eq!(weather[0].icon, Icon::Clear);
}

#[tokio::test]
async fn read_cached_data_without_timestamp_sends_no_data() {
    let server = MockServer::start().await;
    let mut h = harness(&server, Arc::new(MemoryStore::new()), Arc::new(NoLocation));

    h.bridge.read_cached_data();

    let weather = weather_messages(&h.drain());
    assert_eq!(weather, vec![WeatherMessage::no_data()]);
    assert_eq!(weather[0].icon, Icon::Unknown);
    assert_eq!(weather[0].forecast_icon, Icon::Unknown);
}

#[tokio::test]
async fn not_found_keeps_previous_wind_and_sun_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"cod": "404", "message": "city not found"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"cod": 404, "message": "city not found"}))
                .set_delay(FORECAST_DELAY),
        )
        .mount(&server)
        .await;

    let store = store_with_settings(r#"{"CONFIG_SETCITY":"Nowhere"}"#);
    store.set(keys::WEATHER_TIMESTAMP, "1600000000").unwrap();
    store.set(keys::WIND_SPEED, "10").unwrap();
    store.set(keys::SUNRISE, "1599970000").unwrap();
    store.set(keys::SUNSET, "1600010000").unwrap();
    let mut h = harness(&server, store, Arc::new(NoLocation));

    h.bridge
        .on_app_message()
        .await
        .expect("configured city must trigger a fetch")
        .join()
        .await;

    let weather = weather_messages(&h.drain());
    assert_eq!(weather.len(), 1);
    let w = &weather[0];
    assert_eq!(w.temperature, "-°");
    assert_eq!(w.city, "no data");
    assert_eq!(w.icon, Icon::Unknown);
    assert_eq!(w.forecast_icon, Icon::Unknown);
    assert_eq!(w.misc.as_deref(), Some("36 km/h"));
    assert_eq!(h.store.get(keys::SUNRISE).as_deref(), Some("1599970000"));
    assert_eq!(h.store.get(keys::WIND_SPEED).as_deref(), Some("10"));
}

#[tokio::test]
async fn server_errors_are_dropped_silently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let store = store_with_settings(r#"{"CONFIG_SETCITY":"Oslo"}"#);
    store.set(keys::CITY, "Bergen").unwrap();
    let mut h = harness(&server, store, Arc::new(NoLocation));

    h.bridge
        .on_app_message()
        .await
        .expect("configured city must trigger a fetch")
        .join()
        .await;

    assert!(h.drain().is_empty());
    assert_eq!(h.store.get(keys::CITY).as_deref(), Some("Bergen"));
    assert_eq!(h.store.get(keys::WEATHER_TIMESTAMP), None);
}

#[tokio::test]
async fn http_not_found_status_is_dropped_like_other_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"cod": "404", "message": "city not found"})),
        )
        .mount(&server)
        .await;

    let store = store_with_settings(r#"{"CONFIG_SETCITY":"Nowhere"}"#);
    store.set(keys::CITY, "Bergen").unwrap();
    store.set(keys::TEMPERATURE, "280.15").unwrap();
    store.set(keys::ICON, "1").unwrap();
    let mut h = harness(&server, store, Arc::new(NoLocation));

    h.bridge
        .on_app_message()
        .await
        .expect("configured city must trigger a fetch")
        .join()
        .await;

    assert!(h.drain().is_empty());
    assert_eq!(h.store.get(keys::CITY).as_deref(), Some("Bergen"));
    assert_eq!(h.store.get(keys::TEMPERATURE).as_deref(), Some("280.15"));
    assert_eq!(h.store.get(keys::ICON).as_deref(), Some("1"));
    assert_eq!(h.store.get(keys::FORECAST_ICON), None);
}

#[tokio::test]
async fn malformed_json_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let mut h = harness(
        &server,
        store_with_settings(r#"{"CONFIG_SETCITY":"Oslo"}"#),
        Arc::new(NoLocation),
    );

    h.bridge
        .on_app_message()
        .await
        .expect("configured city must trigger a fetch")
        .join()
        .await;

    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn settings_closed_replaces_persists_and_refetches() {
    let server = MockServer::start().await;
    mount_city(&server, "q", "Chicago", "Chicago").await;

    let mut h = harness(&server, Arc::new(MemoryStore::new()), Arc::new(NoLocation));

    let payload = r#"{"CONFIG_REVERSE":1,"CONFIG_BLUETHEME":1,"CONFIG_24H":0,"CONFIG_SECONDS":0,
        "CONFIG_HOURVIBES":0,"CONFIG_FAHRENHEIT":1,"CONFIG_DISTANCE":1,"CONFIG_CITYID":0,
        "CONFIG_SETCITY":"Chicago"}"#;
    h.bridge
        .on_settings_closed(payload)
        .await
        .expect("new city must trigger a fetch")
        .join()
        .await;

    let settings = h.bridge.settings();
    assert!(settings.fahrenheit);
    assert_eq!(settings.city(), Some("Chicago"));

    let stored = h.store.get(keys::CONFIG).expect("settings must be persisted");
    let stored: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["CONFIG_SETCITY"], "Chicago");
    assert_eq!(stored["CONFIG_FAHRENHEIT"], 1);

    let messages = h.drain();
    match &messages[0] {
        AppMessage::Config(mirror) => {
            assert_eq!(mirror.reverse, 1);
            assert_eq!(mirror.blue_theme, 1);
            assert_eq!(mirror.seconds, 0);
        }
        other => panic!("expected config mirror first, got {other:?}"),
    }

    let weather = weather_messages(&messages);
    assert_eq!(weather.len(), 1);
    // 285.15 K is 13 °C, 55.4 °F
    assert_eq!(weather[0].temperature, "55°");
    assert_eq!(weather[0].misc.as_deref(), Some("22 mph"));
}

#[tokio::test]
async fn settings_closed_with_empty_payload_keeps_settings() {
    let server = MockServer::start().await;
    let store = store_with_settings(r#"{"CONFIG_FAHRENHEIT":1}"#);
    let mut h = harness(&server, store, Arc::new(NoLocation));

    assert!(h.bridge.on_settings_closed("").await.is_none());
    assert!(h.bridge.settings().fahrenheit);

    let messages = h.drain();
    assert!(matches!(messages[0], AppMessage::Config(_)));
    assert_eq!(weather_messages(&messages), vec![WeatherMessage::no_gps()]);
}

#[tokio::test]
async fn stale_fetch_cannot_overwrite_newer_one() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("q", "Slowtown"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(current_body("Slowtown", 300.0, 800))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    mount_city(&server, "q", "Fastville", "Fastville").await;

    let mut h = harness(&server, Arc::new(MemoryStore::new()), Arc::new(NoLocation));

    let slow = h.bridge.fetch_weather(Query::CityName("Slowtown".into()));
    let fast = h.bridge.fetch_weather(Query::CityName("Fastville".into()));
    fast.join().await;
    slow.join().await;

    assert_eq!(h.store.get(keys::CITY).as_deref(), Some("Fastville"));
    let weather = weather_messages(&h.drain());
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0].city, "Fastville");
}

#[tokio::test]
async fn file_store_survives_restart_and_serves_fresh_cache() {
    let server = MockServer::start().await;
    mount_city(&server, "q", "Dublin", "Dublin").await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("storage.json");
    let provider = Arc::new(
        OpenWeatherProvider::with_base_url(API_KEY.to_string(), &server.uri())
            .expect("client must build"),
    );

    {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let (link, mut rx) = ChannelLink::pair();
        let bridge = Bridge::new(
            store,
            provider.clone(),
            Arc::new(NoLocation),
            Arc::new(link),
            BridgeOptions::default(),
        );
        bridge
            .on_settings_closed(r#"{"CONFIG_SETCITY":"Dublin","CONFIG_FAHRENHEIT":1}"#)
            .await
            .expect("new city must trigger a fetch")
            .join()
            .await;
        rx.close();
    }

    let reopened = Arc::new(FileStore::open(&path).unwrap());
    assert_eq!(reopened.get(keys::CITY).as_deref(), Some("Dublin"));
    assert_eq!(reopened.get(keys::WEATHER_TIMESTAMP).as_deref(), Some("1700000000"));

    let (link, mut rx) = ChannelLink::pair();
    let bridge = Bridge::new(
        reopened,
        provider,
        Arc::new(NoLocation),
        Arc::new(link),
        BridgeOptions::default(),
    );
    assert!(bridge.settings().fahrenheit);

    // Observed at 1_700_000_000, so five minutes later the cache is still fresh.
    let now = chrono::DateTime::from_timestamp(1_700_000_300, 0).unwrap();
    assert!(bridge.on_ready_at(now).await.is_none());

    let mut weather = Vec::new();
    while let Ok(message) = rx.try_recv() {
        weather.push(message);
    }
    let weather = weather_messages(&weather);
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0].city, "Dublin");
    assert_eq!(weather[0].temperature, "55°");
}
