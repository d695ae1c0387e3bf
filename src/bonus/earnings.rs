//! Bonus earnings on winning payouts
//!
//! Streak and shop-item boost multipliers compose multiplicatively; only the
//! uplift above 1.0 is paid, as a separate ledger entry.

use super::StreakBonus;
use crate::bet::UserId;
use crate::config::BonusConfig;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A purchased payout multiplier with an expiry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveBoost {
    pub id: Uuid,
    pub user_id: UserId,
    pub multiplier: Decimal,
    pub expires_at: DateTime<Utc>,
    /// Shop item that granted it
    pub source: String,
}

/// In-memory boost registry
#[derive(Debug, Default)]
pub struct BoostStore {
    boosts: RwLock<HashMap<UserId, Vec<ActiveBoost>>>,
}

impl BoostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(
        &self,
        user_id: UserId,
        multiplier: Decimal,
        expires_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> ActiveBoost {
        let boost = ActiveBoost {
            id: Uuid::new_v4(),
            user_id,
            multiplier,
            expires_at,
            source: source.into(),
        };
        self.boosts
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(boost.clone());
        boost
    }

    /// Multipliers of unexpired boosts; expired ones are pruned
    pub async fn active(&self, user_id: UserId, now: DateTime<Utc>) -> Vec<Decimal> {
        let mut boosts = self.boosts.write().await;
        match boosts.get_mut(&user_id) {
            Some(list) => {
                list.retain(|b| b.expires_at > now);
                list.iter().map(|b| b.multiplier).collect()
            }
            None => Vec::new(),
        }
    }
}

/// Breakdown of the bonus on one win
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonusBreakdown {
    pub streak_multiplier: Decimal,
    pub boost_multiplier: Decimal,
    /// Capped product of the two
    pub combined: Decimal,
    /// Amount paid on top of the base payout
    pub bonus: Decimal,
}

/// Bonus calculator
#[derive(Debug, Clone)]
pub struct BonusEarnings {
    streak: StreakBonus,
    max_total_multiplier: Decimal,
}

impl BonusEarnings {
    pub fn new(streak: StreakBonus, config: &BonusConfig) -> Self {
        Self {
            streak,
            max_total_multiplier: config.max_total_multiplier.max(Decimal::ONE),
        }
    }

    pub fn streak_bonus(&self) -> &StreakBonus {
        &self.streak
    }

    /// Bonus for a winning payout; `streak` already counts this win
    pub fn compute(&self, payout: Decimal, streak: u32, boosts: &[Decimal]) -> BonusBreakdown {
        let streak_multiplier = self.streak.multiplier(streak);
        let boost_multiplier = boosts
            .iter()
            .filter(|m| **m > Decimal::ONE)
            .fold(Decimal::ONE, |acc, m| acc * m);
        let combined = (streak_multiplier * boost_multiplier).min(self.max_total_multiplier);
        let bonus = (payout * (combined - Decimal::ONE))
            .round_dp(2)
            .max(Decimal::ZERO);

        BonusBreakdown {
            streak_multiplier,
            boost_multiplier,
            combined,
            bonus,
        }
    }
}

impl Default for BonusEarnings {
    fn default() -> Self {
        Self::new(StreakBonus::default(), &BonusConfig::default())
    }
}
