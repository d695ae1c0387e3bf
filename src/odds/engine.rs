//! Odds engine
//!
//! Turns a forecast probability, a range distance or a static bucket into
//! decimal odds. Pricing is total: anything that cannot be priced gets the
//! configured default, and every result lands inside `[min_odds, max_odds]`.

use super::{Bucket, BucketTable};
use crate::bet::{Bet, Category, CurrencyType, Parlay, Prediction, UserId};
use crate::config::OddsConfig;
use crate::weather::{forecast_for_day, DayForecast};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Decimal odds from a probability in percent, with the house edge removed
pub fn probability_odds(probability_pct: f64, house_edge_pct: f64) -> f64 {
    (100.0 / probability_pct.max(1.0)) * (1.0 - house_edge_pct / 100.0)
}

/// Base odds for a temperature band around a forecast point estimate
///
/// Narrow bands pay more; a forecast inside the band cuts the odds to 40 %,
/// one 8 °C or more outside doubles them.
pub fn range_odds(min: f64, max: f64, forecast_point: f64, house_edge_pct: f64) -> f64 {
    let width = (max - min).max(1.0);
    let base = 1.0 + 8.0 / width;
    let distance = range_distance(min, max, forecast_point);
    let factor = 0.4 + 1.6 * (distance / 8.0).min(1.0);
    base * factor * (1.0 - house_edge_pct / 100.0)
}

/// Distance from a value to a closed interval, zero inside
pub fn range_distance(min: f64, max: f64, value: f64) -> f64 {
    if value < min {
        min - value
    } else if value > max {
        value - max
    } else {
        0.0
    }
}

/// Odds engine
#[derive(Debug, Clone)]
pub struct OddsEngine {
    config: OddsConfig,
    table: BucketTable,
}

impl OddsEngine {
    pub fn new(config: OddsConfig) -> Self {
        Self {
            config,
            table: BucketTable,
        }
    }

    pub fn config(&self) -> &OddsConfig {
        &self.config
    }

    pub fn table(&self) -> &BucketTable {
        &self.table
    }

    /// Default odds, kept inside the configured bounds
    pub fn default_odds(&self) -> Decimal {
        self.clamp(self.config.default_odds)
    }

    /// Price a prediction against the forecast for `days_ahead`
    pub fn quote(
        &self,
        category: Category,
        prediction: &Prediction,
        series: &[DayForecast],
        days_ahead: u32,
    ) -> Decimal {
        self.compute_odds(category, prediction, forecast_for_day(series, days_ahead))
    }

    /// Price a prediction against a single day's forecast
    pub fn compute_odds(
        &self,
        category: Category,
        prediction: &Prediction,
        forecast: Option<&DayForecast>,
    ) -> Decimal {
        match self.base_odds(category, prediction, forecast) {
            Some(base) => self.finish(category, base),
            None => {
                tracing::debug!(%category, ?prediction, "No pricing basis, using default odds");
                self.default_odds()
            }
        }
    }

    /// Apply a volatility multiplier to already-priced odds
    pub fn with_volatility(&self, odds: Decimal, multiplier: Decimal) -> Decimal {
        self.clamp(odds * multiplier.max(Decimal::ONE)).round_dp(2)
    }

    /// Combined odds for parlay legs, capped at `max_parlay_odds`
    pub fn parlay_odds(&self, legs: &[Decimal]) -> Decimal {
        if legs.is_empty() {
            return self.default_odds();
        }
        let product = legs.iter().fold(Decimal::ONE, |acc, odds| acc * odds);
        product
            .max(self.config.min_odds)
            .min(self.config.max_parlay_odds)
            .round_dp(2)
    }

    /// Link priced legs into a parlay at their combined odds
    pub fn price_parlay(
        &self,
        user_id: UserId,
        stake: Decimal,
        currency: CurrencyType,
        legs: Vec<Bet>,
    ) -> Parlay {
        let leg_odds: Vec<Decimal> = legs.iter().map(|leg| leg.odds).collect();
        Parlay::new(user_id, stake, self.parlay_odds(&leg_odds), currency, legs)
    }

    fn edge(&self) -> f64 {
        self.config.house_edge_pct.to_f64().unwrap_or(0.0)
    }

    fn base_odds(
        &self,
        category: Category,
        prediction: &Prediction,
        forecast: Option<&DayForecast>,
    ) -> Option<f64> {
        match (category, prediction) {
            (Category::Rain, Prediction::Outcome(yes)) => {
                let p = forecast?.precipitation_probability.clamp(0.0, 100.0);
                let p = if *yes { p } else { 100.0 - p };
                Some(probability_odds(p, self.edge()))
            }
            (Category::Temperature, Prediction::Range { min, max }) => {
                let point = forecast?.point_temperature();
                Some(range_odds(*min, *max, point, self.edge()))
            }
            (Category::Snow, Prediction::Outcome(yes)) => Some(self.table.snow_odds(*yes)),
            (_, Prediction::Bucket(label)) => self.table.find(category, label).map(|b| b.base_odds),
            (_, Prediction::Range { min, max }) => {
                // Static categories price a range by the bucket holding its midpoint
                let mid = (min + max) / 2.0;
                self.table.bucket_for(category, mid).map(|b: &Bucket| b.base_odds)
            }
            _ => None,
        }
    }

    fn finish(&self, category: Category, base: f64) -> Decimal {
        if !base.is_finite() {
            return self.default_odds();
        }
        let base = match Decimal::try_from(base) {
            Ok(d) => d,
            Err(_) => return self.default_odds(),
        };
        let odds = base
            * self.config.category_multipliers.get(category)
            * self.config.global_multiplier;
        self.clamp(odds).round_dp(2)
    }

    fn clamp(&self, odds: Decimal) -> Decimal {
        odds.max(self.config.min_odds).min(self.config.max_odds)
    }
}

impl Default for OddsEngine {
    fn default() -> Self {
        Self::new(OddsConfig::default())
    }
}
