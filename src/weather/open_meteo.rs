//! Open-Meteo client (primary, coordinate-based)
//!
//! Serves both current conditions for settlement and the daily forecast
//! series used for pricing. No API key is required.

use super::{dew_point, City, DayForecast, Source, WeatherError, WeatherProvider, WeatherSnapshot};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Open-Meteo API base URL
pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,dew_point_2m,precipitation,rain,snowfall,weather_code,cloud_cover,pressure_msl,wind_speed_10m";
/// Daily rows are aggregated over UTC days so row dates line up with bet target dates
const FORECAST_TIMEZONE: &str = "GMT";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_probability_max,precipitation_sum,snowfall_sum,wind_speed_10m_max";

/// Configuration for the Open-Meteo client
#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            base_url: OPEN_METEO_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for the Open-Meteo forecast API
pub struct OpenMeteoClient {
    config: OpenMeteoConfig,
    client: Client,
}

impl OpenMeteoClient {
    pub fn new() -> Self {
        Self::with_config(OpenMeteoConfig::default())
    }

    pub fn with_config(config: OpenMeteoConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, client }
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<serde_json::Value, WeatherError> {
        let url = format!("{}/v1/forecast", self.config.base_url);
        tracing::debug!(url = %url, "Fetching Open-Meteo data");

        let response = self.client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::Status { status, body });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    fn source(&self) -> Source {
        Source::Primary
    }

    async fn current(&self, city: &City) -> Result<WeatherSnapshot, WeatherError> {
        let raw = self
            .get(&[
                ("latitude", city.latitude.to_string()),
                ("longitude", city.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("wind_speed_unit", "kmh".to_string()),
            ])
            .await?;

        let parsed: CurrentResponse = serde_json::from_value(raw.clone())?;
        Ok(convert_current(city, parsed.current, raw))
    }

    async fn forecast(&self, city: &City, days: u32) -> Result<Vec<DayForecast>, WeatherError> {
        let raw = self
            .get(&[
                ("latitude", city.latitude.to_string()),
                ("longitude", city.longitude.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("forecast_days", days.clamp(1, 16).to_string()),
                ("timezone", FORECAST_TIMEZONE.to_string()),
            ])
            .await?;

        let parsed: DailyResponse = serde_json::from_value(raw)?;
        Ok(convert_daily(parsed.daily))
    }
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    #[serde(default)]
    dew_point_2m: Option<f64>,
    #[serde(default)]
    precipitation: Option<f64>,
    #[serde(default)]
    rain: Option<f64>,
    #[serde(default)]
    snowfall: Option<f64>,
    #[serde(default)]
    weather_code: Option<u16>,
    cloud_cover: f64,
    pressure_msl: f64,
    wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<NaiveDate>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    snowfall_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

fn convert_current(city: &City, c: CurrentBlock, raw: serde_json::Value) -> WeatherSnapshot {
    let code = c.weather_code.unwrap_or(0);
    let rain_amount = c.rain.or(c.precipitation).unwrap_or(0.0);
    let snowfall = c.snowfall.unwrap_or(0.0);

    WeatherSnapshot {
        city: city.name.clone(),
        source: Source::Primary,
        temperature: c.temperature_2m,
        humidity: c.relative_humidity_2m,
        wind_speed: c.wind_speed_10m,
        pressure: c.pressure_msl,
        cloud_coverage: c.cloud_cover,
        is_raining: rain_amount > 0.0 || is_rain_code(code),
        rain_amount,
        is_snowing: snowfall > 0.0 || is_snow_code(code),
        dew_point: c
            .dew_point_2m
            .unwrap_or_else(|| dew_point(c.temperature_2m, c.relative_humidity_2m)),
        condition: condition_for_code(code).to_string(),
        observed_at: Utc::now(),
        raw,
    }
}

fn convert_daily(d: DailyBlock) -> Vec<DayForecast> {
    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();

    d.time
        .iter()
        .enumerate()
        .filter_map(|(i, date)| {
            // Days without temperatures are useless for pricing
            let max = at(&d.temperature_2m_max, i)?;
            let min = at(&d.temperature_2m_min, i)?;
            Some(DayForecast {
                date: *date,
                temperature_min: min,
                temperature_max: max,
                precipitation_probability: at(&d.precipitation_probability_max, i).unwrap_or(0.0),
                precipitation_sum: at(&d.precipitation_sum, i).unwrap_or(0.0),
                snowfall_sum: at(&d.snowfall_sum, i).unwrap_or(0.0),
                wind_speed_max: at(&d.wind_speed_10m_max, i).unwrap_or(0.0),
            })
        })
        .collect()
}

/// WMO drizzle, rain, showers and thunderstorm codes
fn is_rain_code(code: u16) -> bool {
    matches!(code, 51..=67 | 80..=82 | 95..=99)
}

/// WMO snow codes
fn is_snow_code(code: u16) -> bool {
    matches!(code, 71..=77 | 85 | 86)
}

fn condition_for_code(code: u16) -> &'static str {
    match code {
        0 => "Clear",
        1..=3 => "Clouds",
        45 | 48 => "Fog",
        51..=57 => "Drizzle",
        61..=67 | 80..=82 => "Rain",
        71..=77 | 85 | 86 => "Snow",
        95..=99 => "Thunderstorm",
        _ => "Unknown",
    }
}
