//! Ledger types

use crate::bet::{BetId, BetResult, CurrencyType, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    BetPlaced,
    BetWon,
    BetBonus,
    CashOut,
    PartialCashOut,
}

/// What a ledger entry's `reference_id` points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Bet,
    Parlay,
    Deposit,
}

/// Append-only record of one balance change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: UserId,
    /// Signed delta
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<ReferenceType>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub currency: CurrencyType,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Grading decision to commit for a pending bet
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// `Win` or `Loss`
    pub result: BetResult,
    /// Base payout, `stake × odds` on a win
    pub payout: Decimal,
    /// Streak and boost bonus on top of the payout
    pub bonus: Decimal,
    pub settled_at: DateTime<Utc>,
}

impl Settlement {
    pub fn win(payout: Decimal, bonus: Decimal, settled_at: DateTime<Utc>) -> Self {
        Self {
            result: BetResult::Win,
            payout,
            bonus,
            settled_at,
        }
    }

    pub fn loss(settled_at: DateTime<Utc>) -> Self {
        Self {
            result: BetResult::Loss,
            payout: Decimal::ZERO,
            bonus: Decimal::ZERO,
            settled_at,
        }
    }
}

/// Outcome of a settle attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SettleStatus {
    /// The bet moved out of pending
    Settled {
        result: BetResult,
        /// Everything credited, bonus included; zero for a leg of an open parlay
        credited: Decimal,
        bonus: Decimal,
        /// User's win streak after this settlement
        streak: u32,
    },
    /// The bet had already left pending; nothing changed
    AlreadySettled(BetResult),
}

/// Full or partial cash-out
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CashOutKind {
    Full,
    /// Fraction of the stake closed, strictly between 0 and 1
    Partial { fraction: Decimal },
}

/// A cash-out to commit, tied to the stake it was valued against
#[derive(Debug, Clone, PartialEq)]
pub struct CashOutRequest {
    pub kind: CashOutKind,
    /// Stake the valuation was computed from
    pub expected_stake: Decimal,
    /// Amount to credit
    pub credit: Decimal,
    pub at: DateTime<Utc>,
}

/// Bet book errors
#[derive(Debug, Error, PartialEq)]
pub enum BookError {
    #[error("Unknown bet {0}")]
    UnknownBet(BetId),
    #[error("Bet {0} already exists")]
    DuplicateBet(BetId),
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),
    #[error("Bet {id} is no longer pending ({result:?})")]
    NotPending { id: BetId, result: BetResult },
    #[error("Bet {id} stake changed from {expected} to {actual}")]
    StaleValuation {
        id: BetId,
        expected: Decimal,
        actual: Decimal,
    },
    #[error("Cash-out fraction {0} must be strictly between 0 and 1")]
    InvalidFraction(Decimal),
    #[error("Bet {0} is a parlay leg")]
    ParlayLeg(BetId),
    #[error("Unknown parlay {0}")]
    UnknownParlay(Uuid),
    #[error("Bet {leg} is not linked to parlay {parlay}")]
    UnlinkedLeg { parlay: Uuid, leg: BetId },
    #[error("A parlay needs at least two legs, got {0}")]
    TooFewLegs(usize),
    #[error("Settlement result must be win or loss, got {0:?}")]
    InvalidResult(BetResult),
    #[error("Ledger mismatch for {user} ({currency:?}): balance {balance}, ledger sum {ledger_sum}")]
    LedgerMismatch {
        user: UserId,
        currency: CurrencyType,
        balance: Decimal,
        ledger_sum: Decimal,
    },
}
