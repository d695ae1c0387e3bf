//! Weather data types

use crate::bet::Category;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A city with the coordinates providers are queried with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// Which provider a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Primary,
    Secondary,
}

/// A single category value: numeric measurement or yes/no flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingValue {
    Numeric(f64),
    Flag(bool),
}

impl ReadingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReadingValue::Numeric(v) => Some(*v),
            ReadingValue::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ReadingValue::Flag(b) => Some(*b),
            ReadingValue::Numeric(_) => None,
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Numeric(v) => write!(f, "{}", (v * 100.0).round() / 100.0),
            ReadingValue::Flag(true) => f.write_str("yes"),
            ReadingValue::Flag(false) => f.write_str("no"),
        }
    }
}

// Values travel as strings ("22.5", "yes") in verification records.
// Numbers keep full precision; only Display rounds.
impl Serialize for ReadingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReadingValue::Numeric(v) => serializer.collect_str(v),
            ReadingValue::Flag(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for ReadingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(ReadingValue::Flag(b)),
            Raw::Number(n) => Ok(ReadingValue::Numeric(n)),
            Raw::Text(s) => match s.trim().to_lowercase().as_str() {
                "yes" | "true" => Ok(ReadingValue::Flag(true)),
                "no" | "false" => Ok(ReadingValue::Flag(false)),
                other => other
                    .parse::<f64>()
                    .map(ReadingValue::Numeric)
                    .map_err(|_| serde::de::Error::custom(format!("invalid reading value: {s}"))),
            },
        }
    }
}

/// Current conditions reported by one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub source: Source,
    /// °C
    pub temperature: f64,
    /// %
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
    /// hPa
    pub pressure: f64,
    /// %
    pub cloud_coverage: f64,
    pub is_raining: bool,
    /// mm
    pub rain_amount: f64,
    pub is_snowing: bool,
    /// °C, derived from temperature and humidity when not reported
    pub dew_point: f64,
    pub condition: String,
    pub observed_at: DateTime<Utc>,
    /// Provider payload kept for audit
    pub raw: serde_json::Value,
}

impl WeatherSnapshot {
    /// Value of a category in this snapshot
    pub fn value(&self, category: Category) -> ReadingValue {
        match category {
            Category::Temperature => ReadingValue::Numeric(self.temperature),
            Category::Humidity => ReadingValue::Numeric(self.humidity),
            Category::Wind => ReadingValue::Numeric(self.wind_speed),
            Category::Pressure => ReadingValue::Numeric(self.pressure),
            Category::CloudCoverage => ReadingValue::Numeric(self.cloud_coverage),
            Category::Rainfall => ReadingValue::Numeric(self.rain_amount),
            Category::DewPoint => ReadingValue::Numeric(self.dew_point),
            Category::Rain => ReadingValue::Flag(self.is_raining),
            Category::Snow => ReadingValue::Flag(self.is_snowing),
        }
    }
}

/// Magnus approximation of the dew point in °C
pub fn dew_point(temperature: f64, relative_humidity: f64) -> f64 {
    const A: f64 = 17.62;
    const B: f64 = 243.12;
    let rh = relative_humidity.clamp(1.0, 100.0);
    let gamma = (rh / 100.0).ln() + A * temperature / (B + temperature);
    B * gamma / (A - gamma)
}

/// Daily forecast for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub temperature_min: f64,
    pub temperature_max: f64,
    /// 0-100
    pub precipitation_probability: f64,
    /// mm
    pub precipitation_sum: f64,
    /// cm
    pub snowfall_sum: f64,
    /// km/h
    pub wind_speed_max: f64,
}

impl DayForecast {
    /// Point estimate of the day's temperature
    pub fn point_temperature(&self) -> f64 {
        (self.temperature_min + self.temperature_max) / 2.0
    }
}

/// Forecast for the requested day-ahead index, if the series reaches it
pub fn forecast_for_day(series: &[DayForecast], days_ahead: u32) -> Option<&DayForecast> {
    series.get(days_ahead as usize)
}

/// The row dated `date`, wherever it sits in the series
pub fn forecast_for_date(series: &[DayForecast], date: NaiveDate) -> Option<&DayForecast> {
    series.iter().find(|day| day.date == date)
}

/// Weather provider errors
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed provider payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Provider request timed out")]
    Timeout,
    #[error("Operation not supported by {0} provider")]
    Unsupported(&'static str),
}
