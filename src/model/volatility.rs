//! Volatility model
//!
//! Recency-weighted historical forecast accuracy per (city, category). The
//! less predictable a combination has been, the larger the odds uplift.

use super::AccuracySource;
use crate::bet::Category;
use crate::cache::{Clock, TtlCache};
use crate::config::VolatilityConfig;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Volatility figures for one (city, category)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Volatility {
    /// Odds multiplier, always at least 1
    pub multiplier: Decimal,
    /// Unrounded bonus fraction, `multiplier - 1`
    pub bonus: f64,
    /// Bonus as a percentage
    pub bonus_pct: f64,
    /// Recency-weighted accuracy in percent
    pub avg_accuracy: f64,
    pub sample_count: u64,
    pub has_enough_data: bool,
}

impl Volatility {
    /// No uplift
    pub fn neutral(avg_accuracy: f64, sample_count: u64) -> Self {
        Self {
            multiplier: Decimal::ONE,
            bonus: 0.0,
            bonus_pct: 0.0,
            avg_accuracy,
            sample_count,
            has_enough_data: false,
        }
    }
}

/// Weights for `n` months, most recent first
pub fn recency_weights(n: usize, recent_weight: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let rest = (1.0 - recent_weight) / (n - 1) as f64;
            std::iter::once(recent_weight)
                .chain(std::iter::repeat(rest).take(n - 1))
                .collect()
        }
    }
}

/// Bonus fraction for a weighted accuracy, in `[0, max_bonus]`
pub fn volatility_bonus(weighted_accuracy: f64, config: &VolatilityConfig) -> f64 {
    if config.baseline_accuracy <= 0.0 || weighted_accuracy >= config.baseline_accuracy {
        return 0.0;
    }
    let deficit =
        ((config.baseline_accuracy - weighted_accuracy) / config.baseline_accuracy).clamp(0.0, 1.0);
    deficit.powf(config.curve_exponent) * config.max_bonus
}

/// Volatility model with a per-(city, category) TTL cache
pub struct VolatilityModel {
    config: VolatilityConfig,
    source: Arc<dyn AccuracySource>,
    clock: Arc<dyn Clock>,
    cache: Mutex<TtlCache<(String, Category), Volatility>>,
}

impl VolatilityModel {
    pub fn new(
        config: VolatilityConfig,
        source: Arc<dyn AccuracySource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = Duration::seconds(config.cache_ttl_secs as i64);
        Self {
            config,
            source,
            clock,
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    /// Volatility for (city, category); never fails
    pub async fn get_volatility(&self, city: &str, category: Category) -> Volatility {
        let key = (city.to_lowercase(), category);

        if let Some(hit) = self.cache.lock().await.get(&key, self.clock.now()) {
            tracing::debug!(city, %category, "Volatility cache hit");
            return hit;
        }

        let rows = match self
            .source
            .recent(city, category, self.config.window_months)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(city, %category, error = %e, "Accuracy lookup failed, using neutral volatility");
                return Volatility::neutral(0.0, 0);
            }
        };

        let accuracies: Vec<f64> = rows.iter().map(|r| r.avg_accuracy).collect();
        let sample_count: u64 = rows.iter().map(|r| r.total_predictions).sum();
        let volatility = self.compute(&accuracies, sample_count);

        self.cache
            .lock()
            .await
            .insert(key, volatility.clone(), self.clock.now());

        volatility
    }

    /// Volatility from monthly accuracies (most recent first) and a sample count
    pub fn compute(&self, accuracies: &[f64], sample_count: u64) -> Volatility {
        let weights = recency_weights(accuracies.len(), self.config.recent_weight);
        let weighted: f64 = accuracies.iter().zip(&weights).map(|(a, w)| a * w).sum();

        if sample_count < self.config.min_samples || accuracies.is_empty() {
            return Volatility::neutral(weighted, sample_count);
        }

        let bonus = volatility_bonus(weighted, &self.config);
        let multiplier = Decimal::try_from(1.0 + bonus)
            .map(|m| m.round_dp(4).max(Decimal::ONE))
            .unwrap_or(Decimal::ONE);

        Volatility {
            multiplier,
            bonus,
            bonus_pct: bonus * 100.0,
            avg_accuracy: weighted,
            sample_count,
            has_enough_data: true,
        }
    }
}
