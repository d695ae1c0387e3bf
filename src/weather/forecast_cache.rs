//! Cached forecast lookups
//!
//! Pricing and cash-out polling ask for the same city forecast many times a
//! minute; results are held for a bounded time per (city, days).

use super::{City, DayForecast, WeatherError, WeatherProvider};
use crate::cache::{Clock, TtlCache};
use crate::config::WeatherConfig;
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Forecast provider wrapper with a TTL cache
pub struct ForecastCache {
    provider: Arc<dyn WeatherProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache: Mutex<TtlCache<(String, u32), Vec<DayForecast>>>,
}

impl ForecastCache {
    pub fn new(provider: Arc<dyn WeatherProvider>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            provider,
            clock,
            ttl,
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    /// Cache sized by `weather.forecast_cache_ttl_secs`
    pub fn from_config(
        provider: Arc<dyn WeatherProvider>,
        clock: Arc<dyn Clock>,
        config: &WeatherConfig,
    ) -> Self {
        // chrono durations top out at i64::MAX milliseconds
        let secs = config.forecast_cache_ttl_secs.min(i64::MAX as u64 / 1000) as i64;
        Self::new(provider, clock, Duration::seconds(secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Forecast series for the city, fetched on a miss or after expiry
    pub async fn forecast(&self, city: &City, days: u32) -> Result<Vec<DayForecast>, WeatherError> {
        let key = (city.name.clone(), days);

        if let Some(series) = self.cache.lock().await.get(&key, self.clock.now()) {
            tracing::debug!(city = %city.name, days, "Forecast cache hit");
            return Ok(series);
        }

        let series = self.provider.forecast(city, days).await?;
        self.cache
            .lock()
            .await
            .insert(key, series.clone(), self.clock.now());

        Ok(series)
    }
}
