//! Parlays: linked bets that settle jointly
//!
//! The parlay carries the stake and the combined odds. Legs are ordinary
//! bets with a zero stake that are graded one by one; the book pays the
//! parlay once every leg has won and closes it on the first losing leg.

use super::{Bet, BetResult, CurrencyType, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A staked group of legs whose odds multiply together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parlay {
    pub id: Uuid,
    pub user_id: UserId,
    pub stake: Decimal,
    /// Combined odds fixed at creation
    pub odds: Decimal,
    pub currency: CurrencyType,
    pub legs: Vec<Bet>,
    pub placed_at: DateTime<Utc>,
    pub result: BetResult,
    /// Gross amount credited on a win, bonus included
    pub payout: Option<Decimal>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Parlay {
    /// Link the legs under a fresh parlay id
    ///
    /// Legs take the parlay's user and currency and give up their own stake.
    pub fn new(
        user_id: UserId,
        stake: Decimal,
        odds: Decimal,
        currency: CurrencyType,
        mut legs: Vec<Bet>,
    ) -> Self {
        let id = Uuid::new_v4();
        let placed_at = Utc::now();
        for leg in &mut legs {
            leg.parlay_id = Some(id);
            leg.user_id = user_id;
            leg.currency = currency;
            leg.stake = Decimal::ZERO;
            leg.placed_at = placed_at;
        }
        Self {
            id,
            user_id,
            stake,
            odds,
            currency,
            legs,
            placed_at,
            result: BetResult::Pending,
            payout: None,
            settled_at: None,
        }
    }

    /// Override the placement time of the parlay and its legs
    pub fn placed_at(mut self, placed_at: DateTime<Utc>) -> Self {
        self.placed_at = placed_at;
        for leg in &mut self.legs {
            leg.placed_at = placed_at;
        }
        self
    }

    /// Gross payout if every leg wins, before bonuses
    pub fn potential_payout(&self) -> Decimal {
        self.stake * self.odds
    }

    /// Joint result derived from the legs as currently held
    pub fn joint_result(&self) -> BetResult {
        let results: Vec<BetResult> = self.legs.iter().map(|leg| leg.result).collect();
        joint_result(&results)
    }
}

/// A parlay is lost as soon as any leg loses and won only when every leg wins
pub fn joint_result(results: &[BetResult]) -> BetResult {
    if results.is_empty() {
        return BetResult::Pending;
    }
    if results.iter().any(|r| *r == BetResult::Loss) {
        return BetResult::Loss;
    }
    if results.iter().all(|r| *r == BetResult::Win) {
        return BetResult::Win;
    }
    if results.iter().any(|r| *r == BetResult::CashedOut) {
        return BetResult::CashedOut;
    }
    BetResult::Pending
}
