//! Bet types

use super::Category;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// User identifier
pub type UserId = Uuid;

/// Bet identifier
pub type BetId = Uuid;

/// Which balance a bet is paid from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyType {
    /// Virtual points
    Points,
    /// Real money
    Real,
}

/// Lifecycle state of a bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetResult {
    Pending,
    Win,
    Loss,
    CashedOut,
}

impl BetResult {
    /// Results only ever move out of `Pending`, never back
    pub fn can_transition_to(&self, next: BetResult) -> bool {
        *self == BetResult::Pending && next != BetResult::Pending
    }

    pub fn is_pending(&self) -> bool {
        *self == BetResult::Pending
    }
}

/// What the user predicted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    /// Yes/no outcome for binary categories
    Outcome(bool),
    /// Inclusive numeric band, e.g. temperature between 18 and 22 °C
    Range { min: f64, max: f64 },
    /// Labeled bucket from the static odds table, e.g. "breezy"
    Bucket(String),
}

/// Prediction text that could not be parsed
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid prediction: {0}")]
pub struct InvalidPrediction(pub String);

impl FromStr for Prediction {
    type Err = InvalidPrediction;

    /// Accepts `yes`/`no`, `min..max` ranges, or a bucket label
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidPrediction(s.to_string()));
        }

        match trimmed.to_lowercase().as_str() {
            "yes" | "true" => return Ok(Prediction::Outcome(true)),
            "no" | "false" => return Ok(Prediction::Outcome(false)),
            _ => {}
        }

        if let Some((lo, hi)) = trimmed.split_once("..") {
            let min: f64 = lo.trim().parse().map_err(|_| InvalidPrediction(s.to_string()))?;
            let max: f64 = hi.trim().parse().map_err(|_| InvalidPrediction(s.to_string()))?;
            if !(min.is_finite() && max.is_finite()) || min > max {
                return Err(InvalidPrediction(s.to_string()));
            }
            return Ok(Prediction::Range { min, max });
        }

        Ok(Prediction::Bucket(trimmed.to_lowercase()))
    }
}

/// A wager on a single weather outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub user_id: UserId,
    /// City name as configured
    pub city: String,
    pub category: Category,
    pub prediction: Prediction,
    /// Remaining stake; only partial cash-outs reduce it
    pub stake: Decimal,
    /// Payout multiplier fixed at creation
    pub odds: Decimal,
    pub currency: CurrencyType,
    /// Day the prediction is about
    pub target_date: NaiveDate,
    /// When the bet becomes gradable
    pub expires_at: DateTime<Utc>,
    pub placed_at: DateTime<Utc>,
    pub result: BetResult,
    /// Set when this bet is a parlay leg
    pub parlay_id: Option<Uuid>,
    /// Total credited by cash-outs so far
    pub cashout_amount: Option<Decimal>,
    pub cashed_out_at: Option<DateTime<Utc>>,
    /// Gross amount credited on a win, bonus included
    pub payout: Option<Decimal>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    /// Create a new pending bet placed now
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        city: impl Into<String>,
        category: Category,
        prediction: Prediction,
        stake: Decimal,
        odds: Decimal,
        currency: CurrencyType,
        target_date: NaiveDate,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            city: city.into(),
            category,
            prediction,
            stake,
            odds,
            currency,
            target_date,
            expires_at,
            placed_at: Utc::now(),
            result: BetResult::Pending,
            parlay_id: None,
            cashout_amount: None,
            cashed_out_at: None,
            payout: None,
            settled_at: None,
        }
    }

    /// Override the placement time
    pub fn placed_at(mut self, placed_at: DateTime<Utc>) -> Self {
        self.placed_at = placed_at;
        self
    }

    /// Gross payout if the bet wins, before bonuses
    pub fn potential_payout(&self) -> Decimal {
        self.stake * self.odds
    }

    /// Whether the bet can be graded at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.result.is_pending() && self.expires_at <= now
    }

    /// Whole days between `today` and the target date, floored at zero
    pub fn days_ahead(&self, today: NaiveDate) -> u32 {
        (self.target_date - today).num_days().max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample_bet() -> Bet {
        let now = Utc::now();
        Bet::new(
            Uuid::new_v4(),
            "London",
            Category::Rain,
            Prediction::Outcome(true),
            dec!(10),
            dec!(3.17),
            CurrencyType::Points,
            now.date_naive() + Duration::days(2),
            now + Duration::days(2),
        )
    }

    #[test]
    fn test_result_transitions() {
        assert!(BetResult::Pending.can_transition_to(BetResult::Win));
        assert!(BetResult::Pending.can_transition_to(BetResult::CashedOut));
        assert!(!BetResult::Pending.can_transition_to(BetResult::Pending));
        assert!(!BetResult::Win.can_transition_to(BetResult::Loss));
        assert!(!BetResult::CashedOut.can_transition_to(BetResult::Win));
    }

    #[test]
    fn test_parse_prediction() {
        assert_eq!("yes".parse::<Prediction>().unwrap(), Prediction::Outcome(true));
        assert_eq!("No".parse::<Prediction>().unwrap(), Prediction::Outcome(false));
        assert_eq!(
            "-2..3.5".parse::<Prediction>().unwrap(),
            Prediction::Range { min: -2.0, max: 3.5 }
        );
        assert_eq!(
            "Breezy".parse::<Prediction>().unwrap(),
            Prediction::Bucket("breezy".to_string())
        );
    }

    #[test]
    fn test_parse_prediction_invalid() {
        assert!("".parse::<Prediction>().is_err());
        assert!("5..2".parse::<Prediction>().is_err());
        assert!("a..b".parse::<Prediction>().is_err());
    }

    #[test]
    fn test_new_bet_is_pending() {
        let bet = sample_bet();
        assert_eq!(bet.result, BetResult::Pending);
        assert_eq!(bet.potential_payout(), dec!(31.70));
        assert!(!bet.is_due(Utc::now()));
        assert!(bet.is_due(Utc::now() + Duration::days(3)));
    }

    #[test]
    fn test_days_ahead() {
        let bet = sample_bet();
        let today = Utc::now().date_naive();
        assert_eq!(bet.days_ahead(today), 2);
        assert_eq!(bet.days_ahead(today + Duration::days(5)), 0);
    }
}
