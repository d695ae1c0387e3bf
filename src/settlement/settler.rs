//! City settlement run
//!
//! Verify a city once, record the verification, then grade and commit every
//! due bet through the book. Committing is a compare-and-swap on `Pending`,
//! so running the same city twice never pays twice.

use super::{grade, SettlementEngine, SettlementError, VerificationLog, VerificationLogEntry, VerificationReport};
use crate::bet::{Bet, BetId, BetResult, Category};
use crate::bonus::{BonusBreakdown, BonusEarnings, BoostStore};
use crate::ledger::{BetBook, BonusPolicy, SettleStatus, Settlement};
use crate::odds::BucketTable;
use crate::telemetry::{incr_counter, CounterMetric};
use crate::weather::{City, ReadingValue};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of committing one bet
#[derive(Debug, Clone, PartialEq)]
pub struct BetOutcome {
    pub bet_id: BetId,
    /// Result decided by grading
    pub graded: BetResult,
    pub status: SettleStatus,
    /// Present on wins that paid a bonus
    pub bonus: Option<BonusBreakdown>,
}

/// Streak and boost bonus, priced by the book against the streak it holds
struct WinBonus<'a> {
    earnings: &'a BonusEarnings,
    boosts: &'a [Decimal],
}

impl BonusPolicy for WinBonus<'_> {
    fn bonus(&self, payout: Decimal, streak: u32) -> Decimal {
        self.earnings.compute(payout, streak, self.boosts).bonus
    }
}

/// Summary of one `settle_city` call
#[derive(Debug, Clone, Default)]
pub struct SettlementRun {
    /// `None` when no bet was due and nothing was fetched
    pub report: Option<VerificationReport>,
    pub outcomes: Vec<BetOutcome>,
    /// Bets left pending because no verified value decides them
    pub ungradable: Vec<BetId>,
}

impl SettlementRun {
    pub fn settled_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SettleStatus::Settled { .. }))
            .count()
    }
}

/// Drives verification, grading and payout for a city
pub struct Settler {
    engine: SettlementEngine,
    log: Arc<dyn VerificationLog>,
    book: Arc<dyn BetBook>,
    earnings: BonusEarnings,
    boosts: Arc<BoostStore>,
    table: BucketTable,
}

impl Settler {
    pub fn new(
        engine: SettlementEngine,
        log: Arc<dyn VerificationLog>,
        book: Arc<dyn BetBook>,
        earnings: BonusEarnings,
        boosts: Arc<BoostStore>,
    ) -> Self {
        Self {
            engine,
            log,
            book,
            earnings,
            boosts,
            table: BucketTable,
        }
    }

    pub fn engine(&self) -> &SettlementEngine {
        &self.engine
    }

    /// Settle every due bet in a city
    ///
    /// An empty category list verifies the categories of the due bets.
    /// A primary source failure or an audit write failure aborts before any
    /// bet is touched.
    pub async fn settle_city(
        &self,
        city: &City,
        categories: &[Category],
        now: DateTime<Utc>,
    ) -> Result<SettlementRun, SettlementError> {
        let due: Vec<Bet> = self
            .book
            .pending(Some(&city.name))
            .await
            .into_iter()
            .filter(|b| b.is_due(now))
            .collect();

        if due.is_empty() {
            info!(city = %city.name, "No bets due for settlement");
            return Ok(SettlementRun::default());
        }

        let categories: Vec<Category> = if categories.is_empty() {
            due.iter()
                .map(|b| b.category)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            categories.to_vec()
        };

        let report = self.engine.verify(city, &categories).await?;
        self.log.append(VerificationLogEntry::from_report(&report)).await?;

        let verified = report.verified_values();
        let mut run = SettlementRun::default();

        for bet in &due {
            match self.settle_bet(bet, &verified, now).await? {
                Some(outcome) => run.outcomes.push(outcome),
                None => run.ungradable.push(bet.id),
            }
        }

        info!(
            city = %city.name,
            due = due.len(),
            settled = run.settled_count(),
            ungradable = run.ungradable.len(),
            "Settlement run complete"
        );

        run.report = Some(report);
        Ok(run)
    }

    /// Grade one bet and commit the result; `None` when it cannot be graded
    pub async fn settle_bet(
        &self,
        bet: &Bet,
        verified: &HashMap<Category, ReadingValue>,
        now: DateTime<Utc>,
    ) -> Result<Option<BetOutcome>, SettlementError> {
        let Some(graded) = grade(bet, verified, &self.table) else {
            warn!(bet_id = %bet.id, category = %bet.category, prediction = ?bet.prediction, "Bet cannot be graded, leaving pending");
            return Ok(None);
        };

        let (settlement, boosts) = match graded {
            BetResult::Win => {
                let payout = (bet.stake * bet.odds).round_dp(2);
                let boosts = self.boosts.active(bet.user_id, now).await;
                (Settlement::win(payout, Decimal::ZERO, now), boosts)
            }
            _ => (Settlement::loss(now), Vec::new()),
        };

        let policy = WinBonus {
            earnings: &self.earnings,
            boosts: &boosts,
        };
        let status = self.book.settle_with(bet.id, settlement, &policy).await?;

        let mut bonus = None;
        match &status {
            SettleStatus::Settled {
                result,
                credited,
                bonus: paid,
                streak,
            } => {
                let metric = if *result == BetResult::Win {
                    CounterMetric::BetsWon
                } else {
                    CounterMetric::BetsLost
                };
                incr_counter(metric, 1);
                if *paid > Decimal::ZERO {
                    bonus = Some(self.earnings.compute(*credited - *paid, *streak, &boosts));
                }
                info!(bet_id = %bet.id, result = ?result, credited = %credited, streak, "Bet settled");
            }
            SettleStatus::AlreadySettled(result) => {
                incr_counter(CounterMetric::DuplicateSettlements, 1);
                info!(bet_id = %bet.id, result = ?result, "Bet already settled, skipping");
            }
        }

        Ok(Some(BetOutcome {
            bet_id: bet.id,
            graded,
            status,
            bonus,
        }))
    }
}

/// Serializable view of a run for the CLI
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub city: Option<String>,
    pub settled: usize,
    pub already_settled: usize,
    pub ungradable: usize,
}

impl From<&SettlementRun> for RunSummary {
    fn from(run: &SettlementRun) -> Self {
        Self {
            city: run.report.as_ref().map(|r| r.city.clone()),
            settled: run.settled_count(),
            already_settled: run.outcomes.len() - run.settled_count(),
            ungradable: run.ungradable.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bet::{CurrencyType, Parlay, Prediction};
    use crate::config::DisputeThresholds;
    use crate::ledger::{InMemoryBook, TransactionType};
    use crate::settlement::engine::tests::{snapshot, StubProvider};
    use crate::settlement::MemoryVerificationLog;
    use crate::weather::Source;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::time::Duration as StdDuration;
    use uuid::Uuid;

    struct Harness {
        settler: Settler,
        book: InMemoryBook,
        log: Arc<MemoryVerificationLog>,
        boosts: Arc<BoostStore>,
    }

    fn harness(primary: StubProvider, secondary: StubProvider) -> Harness {
        let book = InMemoryBook::new();
        let log = Arc::new(MemoryVerificationLog::new());
        let boosts = Arc::new(BoostStore::new());
        let engine = SettlementEngine::new(
            Arc::new(primary),
            Arc::new(secondary),
            DisputeThresholds::default(),
            StdDuration::from_millis(200),
        );
        let settler = Settler::new(
            engine,
            log.clone(),
            Arc::new(book.clone()),
            BonusEarnings::default(),
            boosts.clone(),
        );
        Harness {
            settler,
            book,
            log,
            boosts,
        }
    }

    fn agreeing() -> Harness {
        harness(
            StubProvider::Fixed(snapshot(Source::Primary, 21.0, true)),
            StubProvider::Fixed(snapshot(Source::Secondary, 21.5, true)),
        )
    }

    fn berlin() -> City {
        City::new("Berlin", 52.52, 13.41)
    }

    async fn place(book: &InMemoryBook, user: Uuid, category: Category, prediction: Prediction, now: DateTime<Utc>) -> Bet {
        let bet = Bet::new(
            user,
            "Berlin",
            category,
            prediction,
            dec!(10),
            dec!(3.17),
            CurrencyType::Points,
            now.date_naive(),
            now - Duration::minutes(5),
        )
        .placed_at(now - Duration::days(1));
        book.place(bet).await.unwrap()
    }

    #[tokio::test]
    async fn test_settle_city_pays_winners() {
        let h = agreeing();
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(100), now).await.unwrap();

        let win = place(&h.book, user, Category::Rain, Prediction::Outcome(true), now).await;
        let loss = place(&h.book, user, Category::Temperature, Prediction::Range { min: 25.0, max: 30.0 }, now).await;

        let run = h.settler.settle_city(&berlin(), &[], now).await.unwrap();

        assert_eq!(run.settled_count(), 2);
        assert!(run.ungradable.is_empty());
        let report = run.report.unwrap();
        assert_eq!(report.results.len(), 2);

        assert_eq!(h.book.bet(win.id).await.unwrap().result, BetResult::Win);
        assert_eq!(h.book.bet(loss.id).await.unwrap().result, BetResult::Loss);
        // 100 - 10 - 10 + 31.70
        assert_eq!(h.book.balance(user, CurrencyType::Points).await, dec!(111.70));
        assert_eq!(h.log.entries().await.len(), 2);
        h.book.reconcile(user, CurrencyType::Points).await.unwrap();
    }

    #[tokio::test]
    async fn test_settle_city_is_idempotent() {
        let h = agreeing();
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(50), now).await.unwrap();
        let bet = place(&h.book, user, Category::Rain, Prediction::Outcome(true), now).await;

        h.settler.settle_city(&berlin(), &[], now).await.unwrap();
        let balance = h.book.balance(user, CurrencyType::Points).await;

        // Second run finds nothing pending
        let rerun = h.settler.settle_city(&berlin(), &[], now).await.unwrap();
        assert!(rerun.report.is_none());

        // Retrying the commit step directly is a no-op
        let verified: HashMap<_, _> = [(Category::Rain, ReadingValue::Flag(true))].into_iter().collect();
        let outcome = h.settler.settle_bet(&bet, &verified, now).await.unwrap().unwrap();
        assert_eq!(outcome.status, SettleStatus::AlreadySettled(BetResult::Win));
        assert_eq!(h.book.balance(user, CurrencyType::Points).await, balance);
    }

    #[tokio::test]
    async fn test_streak_and_boost_bonus() {
        let h = agreeing();
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(100), now).await.unwrap();
        h.boosts.grant(user, dec!(1.5), now + Duration::days(1), "double_sun").await;

        place(&h.book, user, Category::Rain, Prediction::Outcome(true), now).await;
        let run = h.settler.settle_city(&berlin(), &[], now).await.unwrap();

        let bonus = run.outcomes[0].bonus.clone().unwrap();
        assert_eq!(bonus.combined, dec!(1.5));
        // 31.70 × 0.5
        assert_eq!(bonus.bonus, dec!(15.85));

        let types: Vec<_> = h
            .book
            .entries(user, CurrencyType::Points)
            .await
            .into_iter()
            .map(|e| e.transaction_type)
            .collect();
        assert_eq!(
            types,
            vec![
                TransactionType::Deposit,
                TransactionType::BetPlaced,
                TransactionType::BetWon,
                TransactionType::BetBonus
            ]
        );
        assert_eq!(h.book.streak(user).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_wins_extend_streak_once_each() {
        let h = agreeing();
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(100), now).await.unwrap();
        let verified: HashMap<_, _> = [(Category::Rain, ReadingValue::Flag(true))].into_iter().collect();

        for _ in 0..3 {
            let bet = place(&h.book, user, Category::Rain, Prediction::Outcome(true), now).await;
            h.settler.settle_bet(&bet, &verified, now).await.unwrap();
        }
        assert_eq!(h.book.streak(user).await, 3);

        let a = place(&h.book, user, Category::Rain, Prediction::Outcome(true), now).await;
        let b = place(&h.book, user, Category::Rain, Prediction::Outcome(true), now).await;

        let settler = Arc::new(h.settler);
        let tasks = [a, b].map(|bet| {
            let settler = settler.clone();
            let verified = verified.clone();
            tokio::spawn(async move { settler.settle_bet(&bet, &verified, now).await })
        });

        let mut combined = Vec::new();
        for task in tasks {
            let outcome = task.await.unwrap().unwrap().unwrap();
            combined.push(outcome.bonus.unwrap().combined);
        }
        combined.sort();

        // Streaks 4 and 5, never 4 twice
        assert_eq!(combined, vec![dec!(1.10), dec!(1.20)]);
        assert_eq!(h.book.streak(user).await, 5);
        h.book.reconcile(user, CurrencyType::Points).await.unwrap();
    }

    #[tokio::test]
    async fn test_parlay_paid_once_all_legs_win() {
        let h = agreeing();
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(50), now).await.unwrap();

        let leg = |category, prediction, odds| {
            Bet::new(
                user,
                "Berlin",
                category,
                prediction,
                Decimal::ZERO,
                odds,
                CurrencyType::Points,
                now.date_naive(),
                now - Duration::minutes(5),
            )
        };
        let parlay = Parlay::new(
            user,
            dec!(10),
            dec!(4.20),
            CurrencyType::Points,
            vec![
                leg(Category::Rain, Prediction::Outcome(true), dec!(2.0)),
                leg(Category::Temperature, Prediction::Range { min: 18.0, max: 24.0 }, dec!(2.1)),
            ],
        )
        .placed_at(now - Duration::days(1));
        let parlay = h.book.place_parlay(parlay).await.unwrap();

        let run = h.settler.settle_city(&berlin(), &[], now).await.unwrap();
        assert_eq!(run.settled_count(), 2);

        let settled = h.book.parlay(parlay.id).await.unwrap();
        assert_eq!(settled.result, BetResult::Win);
        assert_eq!(settled.payout, Some(dec!(42.00)));
        assert!(settled.legs.iter().all(|l| l.result == BetResult::Win));
        // 50 - 10 + 42
        assert_eq!(h.book.balance(user, CurrencyType::Points).await, dec!(82.00));
        assert_eq!(h.book.streak(user).await, 1);
        h.book.reconcile(user, CurrencyType::Points).await.unwrap();
    }

    #[tokio::test]
    async fn test_bets_not_due_are_left_alone() {
        let h = agreeing();
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(50), now).await.unwrap();
        let bet = Bet::new(
            user,
            "Berlin",
            Category::Rain,
            Prediction::Outcome(true),
            dec!(10),
            dec!(2),
            CurrencyType::Points,
            now.date_naive() + Duration::days(1),
            now + Duration::days(1),
        );
        h.book.place(bet.clone()).await.unwrap();

        let run = h.settler.settle_city(&berlin(), &[], now).await.unwrap();
        assert!(run.report.is_none());
        assert!(h.book.bet(bet.id).await.unwrap().result.is_pending());
        assert!(h.log.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_primary_failure_grades_nothing() {
        let h = harness(
            StubProvider::Failing(Source::Primary),
            StubProvider::Fixed(snapshot(Source::Secondary, 21.0, true)),
        );
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(50), now).await.unwrap();
        let bet = place(&h.book, user, Category::Rain, Prediction::Outcome(true), now).await;

        let err = h.settler.settle_city(&berlin(), &[], now).await.unwrap_err();
        assert!(matches!(err, SettlementError::PrimaryUnavailable(_)));
        assert!(h.book.bet(bet.id).await.unwrap().result.is_pending());
        assert!(h.log.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_bucket_left_pending() {
        let h = agreeing();
        let user = Uuid::new_v4();
        let now = Utc::now();
        h.book.deposit(user, CurrencyType::Points, dec!(50), now).await.unwrap();
        let bet = place(&h.book, user, Category::Wind, Prediction::Bucket("tornado".into()), now).await;

        let run = h.settler.settle_city(&berlin(), &[], now).await.unwrap();
        assert_eq!(run.ungradable, vec![bet.id]);
        assert!(h.book.bet(bet.id).await.unwrap().result.is_pending());

        let summary = RunSummary::from(&run);
        assert_eq!(summary.ungradable, 1);
        assert_eq!(summary.settled, 0);
    }
}
