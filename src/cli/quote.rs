//! Quote command implementation

use super::{find_city, primary_provider};
use crate::bet::{Category, Prediction};
use crate::cache::SystemClock;
use crate::config::Config;
use crate::model::{
    AccuracySource, DifficultyRating, JsonFileAccuracySource, MemoryAccuracySource,
    VolatilityModel,
};
use crate::odds::{implied_probability, OddsEngine};
use crate::weather::ForecastCache;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// City name as configured
    #[arg(long)]
    pub city: String,

    /// Bet category (temperature, rain, wind, ...)
    #[arg(long)]
    pub category: Category,

    /// `yes`/`no`, a `min..max` range or a bucket label
    #[arg(long)]
    pub prediction: Prediction,

    /// Days between today and the target date
    #[arg(long, default_value_t = 0)]
    pub days_ahead: u32,
}

impl QuoteArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let city = find_city(config, &self.city)?;
        let forecasts =
            ForecastCache::from_config(primary_provider(config), Arc::new(SystemClock), &config.weather);

        let days = config.weather.forecast_days.max(self.days_ahead + 1);
        let series = match forecasts.forecast(&city, days).await {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!(city = %city.name, error = %e, "Forecast unavailable, quoting default odds");
                Vec::new()
            }
        };

        let engine = OddsEngine::new(config.odds.clone());
        let base_odds = engine.quote(self.category, &self.prediction, &series, self.days_ahead);

        let source: Arc<dyn AccuracySource> = match &config.volatility.accuracy_file {
            Some(path) => Arc::new(JsonFileAccuracySource::new(path.clone())),
            None => Arc::new(MemoryAccuracySource::default()),
        };
        let volatility = Arc::new(VolatilityModel::new(
            config.volatility.clone(),
            source,
            Arc::new(SystemClock),
        ));
        let vol = volatility.get_volatility(&city.name, self.category).await;
        let odds = engine.with_volatility(base_odds, vol.multiplier);

        let rating = DifficultyRating::new(config.difficulty.clone(), volatility);
        let difficulty = rating
            .rate(&city.name, self.category, &self.prediction, &series, self.days_ahead)
            .await;

        let output = serde_json::json!({
            "city": city.name,
            "category": self.category,
            "prediction": self.prediction,
            "days_ahead": self.days_ahead,
            "base_odds": base_odds,
            "odds": odds,
            "implied_probability": implied_probability(odds),
            "volatility": vol,
            "difficulty": difficulty,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);

        tracing::info!(city = %city.name, category = %self.category, %odds, level = ?difficulty.level, "Quoted");
        Ok(())
    }
}
