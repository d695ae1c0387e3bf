//! Shared fixtures for integration tests

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;
use weather_odds::bet::{Bet, Category, CurrencyType, Prediction};
use weather_odds::ledger::{BetBook, InMemoryBook};
use weather_odds::weather::City;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn berlin() -> City {
    City::new("Berlin", 52.52, 13.405)
}

/// Open-Meteo style current conditions
pub fn primary_current(temperature: f64, weather_code: u16) -> serde_json::Value {
    serde_json::json!({
        "latitude": 52.52,
        "longitude": 13.405,
        "current": {
            "time": "2024-06-01T12:00",
            "temperature_2m": temperature,
            "relative_humidity_2m": 60,
            "dew_point_2m": 12.0,
            "precipitation": 0.0,
            "rain": 0.0,
            "snowfall": 0.0,
            "weather_code": weather_code,
            "cloud_cover": 75,
            "pressure_msl": 1012.0,
            "wind_speed_10m": 14.4
        }
    })
}

/// Open-Meteo style daily forecast starting today
pub fn primary_daily(days: usize, precipitation_probability: f64) -> serde_json::Value {
    let today = Utc::now().date_naive();
    let dates: Vec<String> = (0..days)
        .map(|i| (today + Duration::days(i as i64)).to_string())
        .collect();
    serde_json::json!({
        "daily": {
            "time": dates,
            "temperature_2m_max": vec![24.0; days],
            "temperature_2m_min": vec![16.0; days],
            "precipitation_probability_max": vec![precipitation_probability; days],
            "precipitation_sum": vec![1.5; days],
            "snowfall_sum": vec![0.0; days],
            "wind_speed_10m_max": vec![20.0; days]
        }
    })
}

/// OpenWeatherMap style current conditions
pub fn secondary_current(temperature: f64, condition: &str) -> serde_json::Value {
    serde_json::json!({
        "weather": [{ "id": 800, "main": condition, "description": condition }],
        "main": { "temp": temperature, "humidity": 62, "pressure": 1013 },
        "wind": { "speed": 4.0, "deg": 200 },
        "clouds": { "all": 80 },
        "dt": 1717243200,
        "name": "Berlin"
    })
}

pub async fn mount_primary(server: &MockServer, current: Option<serde_json::Value>, status: u16) {
    let response = match current {
        Some(body) => ResponseTemplate::new(status).set_body_json(body),
        None => ResponseTemplate::new(status).set_body_string("unavailable"),
    };
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("wind_speed_unit", "kmh"))
        .respond_with(response)
        .mount(server)
        .await;
}

pub async fn mount_primary_daily(server: &MockServer, daily: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("timezone", "GMT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily))
        .mount(server)
        .await;
}

pub async fn mount_secondary(server: &MockServer, current: Option<serde_json::Value>, status: u16) {
    let response = match current {
        Some(body) => ResponseTemplate::new(status).set_body_json(body),
        None => ResponseTemplate::new(status).set_body_string("upstream error"),
    };
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Fund a fresh user
pub async fn funded_user(book: &InMemoryBook, amount: Decimal, currency: CurrencyType) -> Uuid {
    let user = Uuid::new_v4();
    book.deposit(user, currency, amount, Utc::now()).await.unwrap();
    user
}

/// A Berlin bet that expired a minute ago; the offset orders placement
pub fn due_bet(
    user: Uuid,
    category: Category,
    prediction: Prediction,
    now: DateTime<Utc>,
    placed_offset_minutes: i64,
) -> Bet {
    Bet::new(
        user,
        "Berlin",
        category,
        prediction,
        dec!(10),
        dec!(2.0),
        CurrencyType::Points,
        now.date_naive(),
        now - Duration::minutes(1),
    )
    .placed_at(now - Duration::days(1) + Duration::minutes(placed_offset_minutes))
}
