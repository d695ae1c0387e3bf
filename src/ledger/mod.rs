//! Bet book and balance ledger
//!
//! The book is the single transactional boundary for bet results, balances
//! and ledger entries: every balance change writes exactly one entry under
//! the same lock, and result transitions only ever leave `Pending`.

mod memory;
mod types;

pub use memory::InMemoryBook;
pub use types::{
    BookError, CashOutKind, CashOutRequest, LedgerEntry, ReferenceType, SettleStatus, Settlement,
    TransactionType,
};

use crate::bet::{Bet, BetId, CurrencyType, Parlay, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Bonus on a winning payout, priced against the streak the win extends
///
/// Books call this while holding their lock, so `streak` already counts the
/// win being paid and cannot race another settlement for the same user.
pub trait BonusPolicy: Send + Sync {
    fn bonus(&self, payout: Decimal, streak: u32) -> Decimal;
}

/// A bonus decided before settling
#[derive(Debug, Clone, Copy)]
pub struct FixedBonus(pub Decimal);

impl BonusPolicy for FixedBonus {
    fn bonus(&self, _payout: Decimal, _streak: u32) -> Decimal {
        self.0
    }
}

/// Trait for bet book implementations
#[async_trait]
pub trait BetBook: Send + Sync {
    /// Credit a balance from an external deposit
    async fn deposit(
        &self,
        user: UserId,
        currency: CurrencyType,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, BookError>;

    /// Record a new bet and debit its stake
    async fn place(&self, bet: Bet) -> Result<Bet, BookError>;

    /// Record a parlay with its legs and debit the parlay stake once
    async fn place_parlay(&self, parlay: Parlay) -> Result<Parlay, BookError>;

    async fn bet(&self, id: BetId) -> Option<Bet>;

    /// Parlay with its legs as currently held
    async fn parlay(&self, id: Uuid) -> Option<Parlay>;

    /// Pending bets, optionally limited to one city
    async fn pending(&self, city: Option<&str>) -> Vec<Bet>;

    /// Commit a grading decision if and only if the bet is still pending,
    /// paying `settlement.bonus` on a win
    async fn settle(&self, id: BetId, settlement: Settlement) -> Result<SettleStatus, BookError> {
        let bonus = FixedBonus(settlement.bonus);
        self.settle_with(id, settlement, &bonus).await
    }

    /// Commit a grading decision, pricing any win bonus with `policy`
    ///
    /// Settling a parlay leg pays nothing by itself: the parlay is paid at
    /// its own odds when its last leg wins and closed when a leg loses.
    async fn settle_with(
        &self,
        id: BetId,
        settlement: Settlement,
        policy: &dyn BonusPolicy,
    ) -> Result<SettleStatus, BookError>;

    /// Commit a cash-out against the stake it was valued at
    async fn cash_out(&self, id: BetId, request: CashOutRequest) -> Result<Bet, BookError>;

    async fn balance(&self, user: UserId, currency: CurrencyType) -> Decimal;

    /// Ledger entries for a user and currency, oldest first
    async fn entries(&self, user: UserId, currency: CurrencyType) -> Vec<LedgerEntry>;

    /// Current consecutive win count
    async fn streak(&self, user: UserId) -> u32;

    /// Check the ledger sum against the balance
    async fn reconcile(&self, user: UserId, currency: CurrencyType) -> Result<Decimal, BookError>;
}
