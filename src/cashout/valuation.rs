//! Cash-out valuation
//!
//! The offered percentage of stake grows with elapsed time and with how
//! favorable live weather looks for the prediction, is reduced by a penalty,
//! and never exceeds the penalized potential payout.

use super::CashOutError;
use crate::bet::{Bet, Category, Prediction};
use crate::config::CashOutConfig;
use crate::ledger::CashOutKind;
use crate::odds::{range_distance, BucketTable};
use crate::weather::{DayForecast, ReadingValue, WeatherSnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Exit value of an open bet at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashOutCalculation {
    /// Percentage of the stake offered, penalty applied
    pub percentage: Decimal,
    /// Amount credited; for a partial cash-out only the closed fraction
    pub amount: Decimal,
    pub time_bonus: Decimal,
    pub weather_bonus: Decimal,
    pub reasoning: String,
}

/// Distance over which numeric favorability falls from 1 to 0
pub fn favorability_scale(category: Category) -> f64 {
    match category {
        Category::Temperature => 5.0,
        Category::Wind => 15.0,
        Category::Humidity => 20.0,
        Category::Pressure => 10.0,
        Category::CloudCoverage => 25.0,
        Category::Rainfall => 5.0,
        Category::DewPoint => 5.0,
        Category::Rain | Category::Snow => 1.0,
    }
}

/// Favorability from the target day's forecast, when it covers the category
pub fn forecast_favorability(
    category: Category,
    prediction: &Prediction,
    day: &DayForecast,
    table: &BucketTable,
) -> Option<f64> {
    if let Prediction::Outcome(yes) = prediction {
        return match category {
            Category::Rain | Category::Snow => {
                let p = (day.precipitation_probability / 100.0).clamp(0.0, 1.0);
                Some(if *yes { p } else { 1.0 - p })
            }
            _ => None,
        };
    }

    let value = match category {
        Category::Temperature => day.point_temperature(),
        Category::Wind => day.wind_speed_max,
        Category::Rainfall => day.precipitation_sum,
        _ => return None,
    };
    proximity(category, prediction, value, table)
}

/// Favorability from current conditions
pub fn current_favorability(
    category: Category,
    prediction: &Prediction,
    snapshot: &WeatherSnapshot,
    table: &BucketTable,
) -> Option<f64> {
    match (prediction, snapshot.value(category)) {
        (Prediction::Outcome(yes), ReadingValue::Flag(actual)) => {
            Some(if *yes == actual { 1.0 } else { 0.0 })
        }
        (_, ReadingValue::Numeric(value)) => proximity(category, prediction, value, table),
        _ => None,
    }
}

/// 1 inside the predicted interval, decaying linearly with distance outside it
fn proximity(category: Category, prediction: &Prediction, value: f64, table: &BucketTable) -> Option<f64> {
    let distance = match prediction {
        Prediction::Range { min, max } => range_distance(*min, *max, value),
        Prediction::Bucket(label) => {
            let bucket = table.find(category, label)?;
            if bucket.contains(value) {
                0.0
            } else if value < bucket.min {
                bucket.min - value
            } else {
                value - bucket.max
            }
        }
        Prediction::Outcome(_) => return None,
    };
    Some((1.0 - distance / favorability_scale(category)).clamp(0.0, 1.0))
}

/// Cash-out valuation model
#[derive(Debug, Clone)]
pub struct CashOutValuationModel {
    config: CashOutConfig,
}

impl CashOutValuationModel {
    pub fn new(config: CashOutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CashOutConfig {
        &self.config
    }

    /// Cash-out is offered only on pending single bets outside the closing window
    pub fn ensure_available(&self, bet: &Bet, now: DateTime<Utc>) -> Result<(), CashOutError> {
        if bet.parlay_id.is_some() {
            return Err(CashOutError::ParlayLeg(bet.id));
        }
        if !bet.result.is_pending() {
            return Err(CashOutError::NotPending {
                id: bet.id,
                result: bet.result,
            });
        }
        let minutes_left = (bet.expires_at - now).num_minutes();
        if minutes_left < self.config.min_minutes_before_expiry {
            return Err(CashOutError::ClosingWindow {
                id: bet.id,
                minutes_left,
                required: self.config.min_minutes_before_expiry,
            });
        }
        Ok(())
    }

    /// Fraction of the bet window elapsed, in [0, 1]
    pub fn elapsed_fraction(&self, bet: &Bet, now: DateTime<Utc>) -> f64 {
        let window = (bet.expires_at - bet.placed_at).num_seconds();
        if window <= 0 {
            return 1.0;
        }
        let elapsed = (now - bet.placed_at).num_seconds();
        (elapsed as f64 / window as f64).clamp(0.0, 1.0)
    }

    pub fn penalty_pct(&self, kind: CashOutKind) -> Decimal {
        match kind {
            CashOutKind::Full => self.config.full_penalty_pct,
            CashOutKind::Partial { .. } => self.config.partial_penalty_pct,
        }
    }

    /// Value a bet given a favorability in [0, 1]
    pub fn value(
        &self,
        bet: &Bet,
        favorability: f64,
        kind: CashOutKind,
        now: DateTime<Utc>,
    ) -> Result<CashOutCalculation, CashOutError> {
        self.ensure_available(bet, now)?;

        let fraction = match kind {
            CashOutKind::Full => Decimal::ONE,
            CashOutKind::Partial { fraction } => {
                let remaining = (bet.stake - bet.stake * fraction).round_dp(2);
                if fraction <= Decimal::ZERO || fraction >= Decimal::ONE || remaining <= Decimal::ZERO {
                    return Err(CashOutError::InvalidFraction(fraction));
                }
                fraction
            }
        };

        let elapsed = self.elapsed_fraction(bet, now);
        let favorability = if favorability.is_finite() {
            favorability.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let time_bonus = (self.config.max_time_bonus_pct * to_decimal(elapsed)).round_dp(2);
        let weather_bonus = (self.config.max_weather_bonus_pct * to_decimal(favorability)).round_dp(2);
        let penalty = self.penalty_pct(kind);
        let keep = (HUNDRED - penalty).max(Decimal::ZERO) / HUNDRED;

        let raw = self.config.base_pct + time_bonus + weather_bonus;
        let ceiling = bet.odds * HUNDRED * keep;
        let percentage = (raw * keep).min(ceiling).max(Decimal::ZERO).round_dp(2);
        let amount = (bet.stake * percentage / HUNDRED * fraction).round_dp(2);

        let reasoning = format!(
            "{:.0}% of bet window elapsed (+{}%), weather {:.0}% favorable (+{}%), {}% penalty",
            elapsed * 100.0,
            time_bonus,
            favorability * 100.0,
            weather_bonus,
            penalty,
        );

        Ok(CashOutCalculation {
            percentage,
            amount,
            time_bonus,
            weather_bonus,
            reasoning,
        })
    }
}

impl Default for CashOutValuationModel {
    fn default() -> Self {
        Self::new(CashOutConfig::default())
    }
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Percentage as f64 for display and gauges
pub fn percentage_f64(calc: &CashOutCalculation) -> f64 {
    calc.percentage.to_f64().unwrap_or(0.0)
}
