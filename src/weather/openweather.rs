//! OpenWeatherMap client (secondary source)
//!
//! Only current conditions are used; the secondary source exists to
//! cross-check the primary during settlement.

use super::{dew_point, City, DayForecast, Source, WeatherError, WeatherProvider, WeatherSnapshot};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// OpenWeatherMap API base URL
pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org";

/// Configuration for the OpenWeatherMap client
#[derive(Debug, Clone)]
pub struct OpenWeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Query by city name instead of coordinates
    pub query_by_name: bool,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            base_url: OPENWEATHER_URL.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(10),
            query_by_name: false,
        }
    }
}

/// Client for the OpenWeatherMap current weather API
pub struct OpenWeatherClient {
    config: OpenWeatherConfig,
    client: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(OpenWeatherConfig {
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: OpenWeatherConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, client }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    fn source(&self) -> Source {
        Source::Secondary
    }

    async fn current(&self, city: &City) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.config.base_url);
        tracing::debug!(url = %url, city = %city.name, "Fetching OpenWeatherMap data");

        let mut params = vec![
            ("appid", self.config.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        if self.config.query_by_name {
            params.push(("q", city.name.clone()));
        } else {
            params.push(("lat", city.latitude.to_string()));
            params.push(("lon", city.longitude.to_string()));
        }

        let response = self.client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::Status { status, body });
        }

        let text = response.text().await?;
        let raw: serde_json::Value = serde_json::from_str(&text)?;
        let parsed: CurrentWeather = serde_json::from_value(raw.clone())?;

        Ok(convert(city, parsed, raw))
    }

    async fn forecast(&self, _city: &City, _days: u32) -> Result<Vec<DayForecast>, WeatherError> {
        Err(WeatherError::Unsupported("secondary"))
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    weather: Vec<Condition>,
    main: Main,
    wind: Wind,
    #[serde(default)]
    clouds: Option<Clouds>,
    #[serde(default)]
    rain: Option<Precip>,
    #[serde(default)]
    snow: Option<Precip>,
    #[serde(default)]
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct Wind {
    /// m/s with metric units
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct Clouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct Precip {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
    #[serde(rename = "3h", default)]
    three_hours: Option<f64>,
}

impl Precip {
    fn amount(&self) -> f64 {
        self.one_hour.or(self.three_hours).unwrap_or(0.0)
    }
}

fn convert(city: &City, w: CurrentWeather, raw: serde_json::Value) -> WeatherSnapshot {
    let condition = w
        .weather
        .first()
        .map(|c| c.main.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let lowered = condition.to_lowercase();

    let rain_amount = w.rain.as_ref().map(Precip::amount).unwrap_or(0.0);
    let snow_amount = w.snow.as_ref().map(Precip::amount).unwrap_or(0.0);

    let observed_at = w
        .dt
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    WeatherSnapshot {
        city: city.name.clone(),
        source: Source::Secondary,
        temperature: w.main.temp,
        humidity: w.main.humidity,
        wind_speed: w.wind.speed * 3.6,
        pressure: w.main.pressure,
        cloud_coverage: w.clouds.map(|c| c.all).unwrap_or(0.0),
        is_raining: rain_amount > 0.0
            || matches!(lowered.as_str(), "rain" | "drizzle" | "thunderstorm"),
        rain_amount,
        is_snowing: snow_amount > 0.0 || lowered == "snow",
        dew_point: dew_point(w.main.temp, w.main.humidity),
        condition,
        observed_at,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, query_by_name: bool) -> OpenWeatherClient {
        OpenWeatherClient::with_config(OpenWeatherConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            query_by_name,
        })
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({
            "weather": [{ "id": 500, "main": "Rain", "description": "light rain" }],
            "main": { "temp": 17.9, "humidity": 80, "pressure": 1007 },
            "wind": { "speed": 5.0, "deg": 220 },
            "clouds": { "all": 90 },
            "rain": { "1h": 0.6 },
            "dt": 1717243200,
            "name": "London"
        })
    }

    #[tokio::test]
    async fn test_current_by_coordinates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .and(query_param("lat", "51.5074"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
            .mount(&server)
            .await;

        let city = City::new("London", 51.5074, -0.1278);
        let snapshot = client_for(&server, false).current(&city).await.unwrap();

        assert_eq!(snapshot.source, Source::Secondary);
        assert_eq!(snapshot.temperature, 17.9);
        assert!((snapshot.wind_speed - 18.0).abs() < 1e-9);
        assert_eq!(snapshot.cloud_coverage, 90.0);
        assert_eq!(snapshot.rain_amount, 0.6);
        assert!(snapshot.is_raining);
        assert!(!snapshot.is_snowing);
        assert_eq!(snapshot.condition, "Rain");
        assert_eq!(snapshot.observed_at.timestamp(), 1717243200);
    }

    #[tokio::test]
    async fn test_current_by_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
            .mount(&server)
            .await;

        let city = City::new("London", 51.5074, -0.1278);
        assert!(client_for(&server, true).current(&city).await.is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let city = City::new("London", 51.5074, -0.1278);
        let err = client_for(&server, false).current(&city).await.unwrap_err();
        assert!(matches!(err, WeatherError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_forecast_unsupported() {
        let client = OpenWeatherClient::new("key");
        let city = City::new("London", 51.5074, -0.1278);
        let err = client.forecast(&city, 3).await.unwrap_err();
        assert!(matches!(err, WeatherError::Unsupported(_)));
    }
}
