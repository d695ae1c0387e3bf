//! Weather categories that can be bet on

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A weather quantity that bets are placed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Air temperature in °C
    Temperature,
    /// Whether it rains (yes/no)
    Rain,
    /// Rain amount in mm
    Rainfall,
    /// Wind speed in km/h
    Wind,
    /// Relative humidity in %
    Humidity,
    /// Sea level pressure in hPa
    Pressure,
    /// Cloud coverage in %
    CloudCoverage,
    /// Dew point in °C
    DewPoint,
    /// Whether it snows (yes/no)
    Snow,
}

impl Category {
    /// Every known category
    pub const ALL: [Category; 9] = [
        Category::Temperature,
        Category::Rain,
        Category::Rainfall,
        Category::Wind,
        Category::Humidity,
        Category::Pressure,
        Category::CloudCoverage,
        Category::DewPoint,
        Category::Snow,
    ];

    /// Yes/no categories compared by agreement rather than distance
    pub fn is_binary(&self) -> bool {
        matches!(self, Category::Rain | Category::Snow)
    }

    /// Stable identifier used in config files and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Temperature => "temperature",
            Category::Rain => "rain",
            Category::Rainfall => "rainfall",
            Category::Wind => "wind",
            Category::Humidity => "humidity",
            Category::Pressure => "pressure",
            Category::CloudCoverage => "cloud_coverage",
            Category::DewPoint => "dew_point",
            Category::Snow => "snow",
        }
    }

    /// Measurement unit
    pub fn unit(&self) -> &'static str {
        match self {
            Category::Temperature | Category::DewPoint => "°C",
            Category::Rainfall => "mm",
            Category::Wind => "km/h",
            Category::Humidity | Category::CloudCoverage => "%",
            Category::Pressure => "hPa",
            Category::Rain | Category::Snow => "",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized category name
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown weather category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "temperature" | "temp" => Ok(Category::Temperature),
            "rain" => Ok(Category::Rain),
            "rainfall" | "rain_amount" => Ok(Category::Rainfall),
            "wind" | "wind_speed" => Ok(Category::Wind),
            "humidity" => Ok(Category::Humidity),
            "pressure" => Ok(Category::Pressure),
            "cloud_coverage" | "cloud" | "clouds" => Ok(Category::CloudCoverage),
            "dew_point" | "dewpoint" => Ok(Category::DewPoint),
            "snow" => Ok(Category::Snow),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}
