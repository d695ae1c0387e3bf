//! In-memory bet book

use super::{
    BetBook, BonusPolicy, BookError, CashOutKind, CashOutRequest, LedgerEntry, ReferenceType,
    SettleStatus, Settlement, TransactionType,
};
use crate::bet::{joint_result, Bet, BetId, BetResult, CurrencyType, Parlay, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct BookState {
    bets: HashMap<BetId, Bet>,
    balances: HashMap<(UserId, CurrencyType), Decimal>,
    parlays: HashMap<Uuid, Parlay>,
    ledger: Vec<LedgerEntry>,
    streaks: HashMap<UserId, u32>,
}

struct Posting {
    user: UserId,
    currency: CurrencyType,
    amount: Decimal,
    transaction_type: TransactionType,
    reference: Option<(Uuid, ReferenceType)>,
    metadata: serde_json::Value,
    at: DateTime<Utc>,
}

/// A win or loss closing a single bet or a whole parlay
struct Closing {
    user: UserId,
    currency: CurrencyType,
    reference: (Uuid, ReferenceType),
    result: BetResult,
    payout: Decimal,
    metadata: serde_json::Value,
    at: DateTime<Utc>,
}

/// What one settlement paid
struct Credit {
    credited: Decimal,
    bonus: Decimal,
    streak: u32,
}

impl Credit {
    fn nothing(streak: u32) -> Self {
        Self {
            credited: Decimal::ZERO,
            bonus: Decimal::ZERO,
            streak,
        }
    }
}

impl BookState {
    fn streak(&self, user: UserId) -> u32 {
        self.streaks.get(&user).copied().unwrap_or(0)
    }

    /// Pay a win and extend the streak, or reset the streak on a loss
    fn close(&mut self, closing: Closing, policy: &dyn BonusPolicy) -> Credit {
        if closing.result != BetResult::Win {
            self.streaks.insert(closing.user, 0);
            return Credit::nothing(0);
        }

        let streak = self.streak(closing.user) + 1;
        let bonus = policy.bonus(closing.payout, streak).max(Decimal::ZERO);
        let reference = Some(closing.reference);
        let mut credited = Decimal::ZERO;

        if closing.payout > Decimal::ZERO {
            self.post(Posting {
                user: closing.user,
                currency: closing.currency,
                amount: closing.payout,
                transaction_type: TransactionType::BetWon,
                reference,
                metadata: closing.metadata,
                at: closing.at,
            });
            credited += closing.payout;
        }
        if bonus > Decimal::ZERO {
            self.post(Posting {
                user: closing.user,
                currency: closing.currency,
                amount: bonus,
                transaction_type: TransactionType::BetBonus,
                reference,
                metadata: serde_json::json!({ "streak": streak }),
                at: closing.at,
            });
            credited += bonus;
        }
        self.streaks.insert(closing.user, streak);

        Credit {
            credited,
            bonus,
            streak,
        }
    }

    /// Re-derive a parlay's result after one of its legs settled
    fn settle_parlay(&mut self, parlay_id: Uuid, at: DateTime<Utc>, policy: &dyn BonusPolicy) -> Credit {
        let Some(parlay) = self.parlays.get(&parlay_id).cloned() else {
            return Credit::nothing(0);
        };
        if !parlay.result.is_pending() {
            return Credit::nothing(self.streak(parlay.user_id));
        }

        let results: Vec<BetResult> = parlay
            .legs
            .iter()
            .map(|leg| self.bets.get(&leg.id).map_or(leg.result, |b| b.result))
            .collect();
        let joint = joint_result(&results);
        if !matches!(joint, BetResult::Win | BetResult::Loss) {
            return Credit::nothing(self.streak(parlay.user_id));
        }

        let payout = if joint == BetResult::Win {
            (parlay.stake * parlay.odds).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let credit = self.close(
            Closing {
                user: parlay.user_id,
                currency: parlay.currency,
                reference: (parlay.id, ReferenceType::Parlay),
                result: joint,
                payout,
                metadata: serde_json::json!({
                    "odds": parlay.odds,
                    "stake": parlay.stake,
                    "legs": parlay.legs.len(),
                }),
                at,
            },
            policy,
        );

        if let Some(stored) = self.parlays.get_mut(&parlay_id) {
            stored.result = joint;
            stored.settled_at = Some(at);
            if joint == BetResult::Win {
                stored.payout = Some(credit.credited);
            }
        }
        tracing::info!(%parlay_id, result = ?joint, credited = %credit.credited, "Parlay settled");
        credit
    }

    fn balance(&self, user: UserId, currency: CurrencyType) -> Decimal {
        self.balances
            .get(&(user, currency))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Apply a balance delta together with its ledger entry
    fn post(&mut self, posting: Posting) -> LedgerEntry {
        let before = self.balance(posting.user, posting.currency);
        let after = before + posting.amount;
        self.balances.insert((posting.user, posting.currency), after);

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            user_id: posting.user,
            amount: posting.amount,
            transaction_type: posting.transaction_type,
            reference_id: posting.reference.map(|(id, _)| id),
            reference_type: posting.reference.map(|(_, kind)| kind),
            balance_before: before,
            balance_after: after,
            currency: posting.currency,
            metadata: posting.metadata,
            created_at: posting.at,
        };
        self.ledger.push(entry.clone());
        entry
    }
}

/// In-memory bet book; one lock covers bets, balances and the ledger
#[derive(Clone, Default)]
pub struct InMemoryBook {
    state: Arc<RwLock<BookState>>,
}

impl InMemoryBook {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BetBook for InMemoryBook {
    async fn deposit(
        &self,
        user: UserId,
        currency: CurrencyType,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, BookError> {
        if amount <= Decimal::ZERO {
            return Err(BookError::InvalidAmount(amount));
        }

        let mut state = self.state.write().await;
        let entry = state.post(Posting {
            user,
            currency,
            amount,
            transaction_type: TransactionType::Deposit,
            reference: Some((Uuid::new_v4(), ReferenceType::Deposit)),
            metadata: serde_json::Value::Null,
            at,
        });

        tracing::info!(%user, ?currency, %amount, "Deposit credited");
        Ok(entry)
    }

    async fn place(&self, bet: Bet) -> Result<Bet, BookError> {
        if bet.parlay_id.is_some() {
            return Err(BookError::ParlayLeg(bet.id));
        }
        if bet.stake <= Decimal::ZERO {
            return Err(BookError::InvalidAmount(bet.stake));
        }

        let mut state = self.state.write().await;
        if state.bets.contains_key(&bet.id) {
            return Err(BookError::DuplicateBet(bet.id));
        }

        let available = state.balance(bet.user_id, bet.currency);
        if available < bet.stake {
            return Err(BookError::InsufficientFunds {
                needed: bet.stake,
                available,
            });
        }

        state.post(Posting {
            user: bet.user_id,
            currency: bet.currency,
            amount: -bet.stake,
            transaction_type: TransactionType::BetPlaced,
            reference: Some((bet.id, ReferenceType::Bet)),
            metadata: serde_json::json!({
                "city": bet.city,
                "category": bet.category,
                "odds": bet.odds,
            }),
            at: bet.placed_at,
        });
        state.bets.insert(bet.id, bet.clone());

        tracing::info!(bet_id = %bet.id, city = %bet.city, category = %bet.category, stake = %bet.stake, odds = %bet.odds, "Bet placed");
        Ok(bet)
    }

    async fn place_parlay(&self, parlay: Parlay) -> Result<Parlay, BookError> {
        if parlay.legs.len() < 2 {
            return Err(BookError::TooFewLegs(parlay.legs.len()));
        }
        if parlay.stake <= Decimal::ZERO {
            return Err(BookError::InvalidAmount(parlay.stake));
        }
        if let Some(leg) = parlay.legs.iter().find(|l| l.parlay_id != Some(parlay.id)) {
            return Err(BookError::UnlinkedLeg {
                parlay: parlay.id,
                leg: leg.id,
            });
        }
        if let Some(leg) = parlay.legs.iter().find(|l| !l.result.is_pending()) {
            return Err(BookError::NotPending {
                id: leg.id,
                result: leg.result,
            });
        }

        let mut state = self.state.write().await;
        if state.parlays.contains_key(&parlay.id) {
            return Err(BookError::DuplicateBet(parlay.id));
        }
        if let Some(leg) = parlay.legs.iter().find(|l| state.bets.contains_key(&l.id)) {
            return Err(BookError::DuplicateBet(leg.id));
        }

        let available = state.balance(parlay.user_id, parlay.currency);
        if available < parlay.stake {
            return Err(BookError::InsufficientFunds {
                needed: parlay.stake,
                available,
            });
        }

        state.post(Posting {
            user: parlay.user_id,
            currency: parlay.currency,
            amount: -parlay.stake,
            transaction_type: TransactionType::BetPlaced,
            reference: Some((parlay.id, ReferenceType::Parlay)),
            metadata: serde_json::json!({
                "odds": parlay.odds,
                "legs": parlay.legs.iter().map(|l| l.id).collect::<Vec<_>>(),
            }),
            at: parlay.placed_at,
        });
        for leg in &parlay.legs {
            state.bets.insert(leg.id, leg.clone());
        }
        state.parlays.insert(parlay.id, parlay.clone());

        tracing::info!(parlay_id = %parlay.id, legs = parlay.legs.len(), stake = %parlay.stake, odds = %parlay.odds, "Parlay placed");
        Ok(parlay)
    }

    async fn bet(&self, id: BetId) -> Option<Bet> {
        self.state.read().await.bets.get(&id).cloned()
    }

    async fn parlay(&self, id: Uuid) -> Option<Parlay> {
        let state = self.state.read().await;
        let mut parlay = state.parlays.get(&id).cloned()?;
        for leg in &mut parlay.legs {
            if let Some(current) = state.bets.get(&leg.id) {
                *leg = current.clone();
            }
        }
        Some(parlay)
    }

    async fn pending(&self, city: Option<&str>) -> Vec<Bet> {
        let state = self.state.read().await;
        let mut bets: Vec<Bet> = state
            .bets
            .values()
            .filter(|b| b.result.is_pending())
            .filter(|b| city.map_or(true, |c| b.city.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        bets.sort_by_key(|b| b.placed_at);
        bets
    }

    async fn settle_with(
        &self,
        id: BetId,
        settlement: Settlement,
        policy: &dyn BonusPolicy,
    ) -> Result<SettleStatus, BookError> {
        if !matches!(settlement.result, BetResult::Win | BetResult::Loss) {
            return Err(BookError::InvalidResult(settlement.result));
        }

        let mut state = self.state.write().await;
        let bet = state.bets.get(&id).cloned().ok_or(BookError::UnknownBet(id))?;

        // Compare-and-swap on Pending: retried settlement is a no-op
        if !bet.result.can_transition_to(settlement.result) {
            tracing::debug!(bet_id = %id, result = ?bet.result, "Bet already settled");
            return Ok(SettleStatus::AlreadySettled(bet.result));
        }
        if let Some(parlay_id) = bet.parlay_id {
            if !state.parlays.contains_key(&parlay_id) {
                return Err(BookError::UnknownParlay(parlay_id));
            }
        }

        if let Some(stored) = state.bets.get_mut(&id) {
            stored.result = settlement.result;
            stored.settled_at = Some(settlement.settled_at);
        }

        let credit = match bet.parlay_id {
            Some(parlay_id) => state.settle_parlay(parlay_id, settlement.settled_at, policy),
            None => {
                let credit = state.close(
                    Closing {
                        user: bet.user_id,
                        currency: bet.currency,
                        reference: (id, ReferenceType::Bet),
                        result: settlement.result,
                        payout: settlement.payout,
                        metadata: serde_json::json!({ "odds": bet.odds, "stake": bet.stake }),
                        at: settlement.settled_at,
                    },
                    policy,
                );
                if settlement.result == BetResult::Win {
                    if let Some(stored) = state.bets.get_mut(&id) {
                        stored.payout = Some(credit.credited);
                    }
                }
                credit
            }
        };

        Ok(SettleStatus::Settled {
            result: settlement.result,
            credited: credit.credited,
            bonus: credit.bonus,
            streak: credit.streak,
        })
    }

    async fn cash_out(&self, id: BetId, request: CashOutRequest) -> Result<Bet, BookError> {
        if request.credit < Decimal::ZERO {
            return Err(BookError::InvalidAmount(request.credit));
        }

        let mut state = self.state.write().await;
        let bet = state.bets.get(&id).cloned().ok_or(BookError::UnknownBet(id))?;

        if bet.parlay_id.is_some() {
            return Err(BookError::ParlayLeg(id));
        }
        if !bet.result.is_pending() {
            return Err(BookError::NotPending {
                id,
                result: bet.result,
            });
        }
        if bet.stake != request.expected_stake {
            return Err(BookError::StaleValuation {
                id,
                expected: request.expected_stake,
                actual: bet.stake,
            });
        }

        let (transaction_type, new_stake) = match request.kind {
            CashOutKind::Full => (TransactionType::CashOut, bet.stake),
            CashOutKind::Partial { fraction } => {
                if fraction <= Decimal::ZERO || fraction >= Decimal::ONE {
                    return Err(BookError::InvalidFraction(fraction));
                }
                let remaining = (bet.stake - bet.stake * fraction).round_dp(2);
                if remaining <= Decimal::ZERO {
                    return Err(BookError::InvalidFraction(fraction));
                }
                (TransactionType::PartialCashOut, remaining)
            }
        };

        state.post(Posting {
            user: bet.user_id,
            currency: bet.currency,
            amount: request.credit,
            transaction_type,
            reference: Some((id, ReferenceType::Bet)),
            metadata: serde_json::json!({
                "stake_before": bet.stake,
                "stake_after": new_stake,
            }),
            at: request.at,
        });

        let stored = state.bets.get_mut(&id).ok_or(BookError::UnknownBet(id))?;
        stored.cashout_amount = Some(stored.cashout_amount.unwrap_or(Decimal::ZERO) + request.credit);
        stored.cashed_out_at = Some(request.at);
        match request.kind {
            CashOutKind::Full => stored.result = BetResult::CashedOut,
            CashOutKind::Partial { .. } => stored.stake = new_stake,
        }

        Ok(stored.clone())
    }

    async fn balance(&self, user: UserId, currency: CurrencyType) -> Decimal {
        self.state.read().await.balance(user, currency)
    }

    async fn entries(&self, user: UserId, currency: CurrencyType) -> Vec<LedgerEntry> {
        self.state
            .read()
            .await
            .ledger
            .iter()
            .filter(|e| e.user_id == user && e.currency == currency)
            .cloned()
            .collect()
    }

    async fn streak(&self, user: UserId) -> u32 {
        self.state.read().await.streak(user)
    }

    async fn reconcile(&self, user: UserId, currency: CurrencyType) -> Result<Decimal, BookError> {
        let state = self.state.read().await;
        let balance = state.balance(user, currency);
        let ledger_sum: Decimal = state
            .ledger
            .iter()
            .filter(|e| e.user_id == user && e.currency == currency)
            .map(|e| e.amount)
            .sum();

        if ledger_sum != balance {
            tracing::error!(%user, ?currency, %balance, %ledger_sum, "Ledger does not match balance");
            return Err(BookError::LedgerMismatch {
                user,
                currency,
                balance,
                ledger_sum,
            });
        }
        Ok(balance)
    }
}
