//! Weather data module
//!
//! Current conditions and daily forecasts from two independent providers:
//! Open-Meteo (primary, coordinates) and OpenWeatherMap (secondary).

mod forecast_cache;
mod open_meteo;
mod openweather;
mod types;

pub use forecast_cache::ForecastCache;
pub use open_meteo::{OpenMeteoClient, OpenMeteoConfig, OPEN_METEO_URL};
pub use openweather::{OpenWeatherClient, OpenWeatherConfig, OPENWEATHER_URL};
pub use types::{
    dew_point, forecast_for_date, forecast_for_day, City, DayForecast, ReadingValue, Source, WeatherError,
    WeatherSnapshot,
};

use async_trait::async_trait;

/// Trait for weather data providers
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Which leg of a verification this provider serves
    fn source(&self) -> Source;

    /// Current conditions for the city
    async fn current(&self, city: &City) -> Result<WeatherSnapshot, WeatherError>;

    /// Daily forecast starting today, `days` entries at most
    async fn forecast(&self, city: &City, days: u32) -> Result<Vec<DayForecast>, WeatherError>;
}
