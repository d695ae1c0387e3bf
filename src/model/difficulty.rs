//! Difficulty rating
//!
//! Informational only: combines volatility, how far ahead the bet is and
//! forecast uncertainty into a 0-1 score. Never feeds settlement.

use super::VolatilityModel;
use crate::bet::{Category, Prediction};
use crate::config::DifficultyConfig;
use crate::weather::{forecast_for_day, DayForecast};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Coarse difficulty band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DifficultyLevel::Easy => "Easy",
            DifficultyLevel::Medium => "Medium",
            DifficultyLevel::Hard => "Hard",
            DifficultyLevel::Expert => "Expert",
        };
        f.write_str(s)
    }
}

/// Normalized factor scores, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifficultyFactors {
    pub volatility: f64,
    pub time_decay: f64,
    pub uncertainty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difficulty {
    pub level: DifficultyLevel,
    pub score: f64,
    pub factors: DifficultyFactors,
    /// Volatility bonus plus day-ahead bonus, in percent
    pub odds_bonus_pct: f64,
}

/// Forecast uncertainty heuristic for a prediction
pub fn forecast_uncertainty(
    category: Category,
    prediction: &Prediction,
    forecast: Option<&DayForecast>,
) -> f64 {
    match (category, prediction, forecast) {
        (Category::Rain, _, Some(day)) => {
            let p = day.precipitation_probability.clamp(0.0, 100.0);
            1.0 - (p - 50.0).abs() / 50.0
        }
        (Category::Temperature, Prediction::Range { min, max }, Some(day)) => {
            let width = max - min;
            let range_mid = (min + max) / 2.0;
            let narrowness = 1.0 - (width / 10.0).min(1.0);
            let offset = ((day.point_temperature() - range_mid).abs() / 10.0).min(1.0);
            0.5 * narrowness + 0.5 * offset
        }
        (Category::Snow, _, _) => 0.9,
        _ => 0.5,
    }
}

/// Difficulty rater backed by the volatility model
pub struct DifficultyRating {
    config: DifficultyConfig,
    volatility: Arc<VolatilityModel>,
}

impl DifficultyRating {
    pub fn new(config: DifficultyConfig, volatility: Arc<VolatilityModel>) -> Self {
        Self { config, volatility }
    }

    /// Rate a prediction
    pub async fn rate(
        &self,
        city: &str,
        category: Category,
        prediction: &Prediction,
        series: &[DayForecast],
        days_ahead: u32,
    ) -> Difficulty {
        let volatility = self.volatility.get_volatility(city, category).await;
        let uncertainty =
            forecast_uncertainty(category, prediction, forecast_for_day(series, days_ahead));
        self.combine(volatility.bonus_pct, days_ahead, uncertainty)
    }

    /// Day-ahead odds bonus in percent
    pub fn time_bonus_pct(&self, days_ahead: u32) -> f64 {
        (days_ahead as f64 * self.config.time_bonus_per_day_pct).min(self.config.max_time_bonus_pct)
    }

    /// Weighted score from the three factor inputs
    pub fn combine(&self, volatility_bonus_pct: f64, days_ahead: u32, uncertainty: f64) -> Difficulty {
        let c = &self.config;
        let time_bonus = self.time_bonus_pct(days_ahead);

        let factors = DifficultyFactors {
            volatility: ratio(volatility_bonus_pct, c.volatility_ceiling_pct),
            time_decay: ratio(time_bonus, c.max_time_bonus_pct),
            uncertainty: uncertainty.clamp(0.0, 1.0),
        };

        let score = (factors.volatility * c.volatility_weight
            + factors.time_decay * c.time_weight
            + factors.uncertainty * c.uncertainty_weight)
            .clamp(0.0, 1.0);

        Difficulty {
            level: self.level(score),
            score,
            factors,
            odds_bonus_pct: volatility_bonus_pct + time_bonus,
        }
    }

    pub fn level(&self, score: f64) -> DifficultyLevel {
        if score < self.config.easy_below {
            DifficultyLevel::Easy
        } else if score < self.config.medium_below {
            DifficultyLevel::Medium
        } else if score < self.config.hard_below {
            DifficultyLevel::Hard
        } else {
            DifficultyLevel::Expert
        }
    }
}

fn ratio(value: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 {
        return 0.0;
    }
    (value / ceiling).clamp(0.0, 1.0)
}
