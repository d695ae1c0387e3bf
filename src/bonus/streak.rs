//! Win streak multiplier

use crate::config::{StreakConfig, StreakTier};
use rust_decimal::Decimal;

/// Maps a streak length to a payout multiplier
#[derive(Debug, Clone)]
pub struct StreakBonus {
    min_streak: u32,
    max_multiplier: Decimal,
    /// Ascending by streak
    tiers: Vec<StreakTier>,
}

impl StreakBonus {
    pub fn new(config: &StreakConfig) -> Self {
        let mut tiers = config.tiers.clone();
        tiers.sort_by_key(|t| t.streak);
        Self {
            min_streak: config.min_streak,
            max_multiplier: config.max_multiplier.max(Decimal::ONE),
            tiers,
        }
    }

    /// Multiplier of the highest tier reached, capped; 1.0 below the minimum
    ///
    /// Running maximum over the tiers keeps the result non-decreasing even
    /// if a configured table is not.
    pub fn multiplier(&self, streak: u32) -> Decimal {
        if streak < self.min_streak {
            return Decimal::ONE;
        }
        self.tiers
            .iter()
            .take_while(|t| t.streak <= streak)
            .map(|t| t.multiplier)
            .fold(Decimal::ONE, Decimal::max)
            .min(self.max_multiplier)
    }
}

impl Default for StreakBonus {
    fn default() -> Self {
        Self::new(&StreakConfig::default())
    }
}
