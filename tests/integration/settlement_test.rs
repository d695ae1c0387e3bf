//! End-to-end settlement against mocked weather providers

use crate::support::*;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use weather_odds::bet::{BetResult, Category, CurrencyType, Prediction};
use weather_odds::bonus::{BonusEarnings, BoostStore};
use weather_odds::ledger::{BetBook, InMemoryBook, TransactionType};
use weather_odds::settlement::{
    resolve_all_disputed, BulkStrategy, JsonlVerificationLog, OverrideRequest, ResolutionMethod,
    SettlementEngine, SettlementError, Settler, VerificationLog,
};
use weather_odds::weather::{
    OpenMeteoClient, OpenMeteoConfig, OpenWeatherClient, OpenWeatherConfig, ReadingValue,
};
use wiremock::MockServer;

fn engine(primary: &MockServer, secondary: &MockServer) -> SettlementEngine {
    SettlementEngine::new(
        Arc::new(OpenMeteoClient::with_config(OpenMeteoConfig {
            base_url: primary.uri(),
            timeout: Duration::from_secs(5),
        })),
        Arc::new(OpenWeatherClient::with_config(OpenWeatherConfig {
            base_url: secondary.uri(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            query_by_name: false,
        })),
        Default::default(),
        Duration::from_secs(5),
    )
}

fn settler(engine: SettlementEngine, log: Arc<dyn VerificationLog>, book: &InMemoryBook) -> Settler {
    Settler::new(
        engine,
        log,
        Arc::new(book.clone()),
        BonusEarnings::default(),
        Arc::new(BoostStore::new()),
    )
}

#[tokio::test]
async fn test_settle_city_with_disputes_and_audit_trail() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    // Primary: 20 °C with rain; secondary: 25 °C and clear
    mount_primary(&primary, Some(primary_current(20.0, 61)), 200).await;
    mount_secondary(&secondary, Some(secondary_current(25.0, "Clear")), 200).await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("verifications.jsonl");
    let log = Arc::new(assert_ok!(JsonlVerificationLog::open(&log_path).await));

    let book = InMemoryBook::new();
    let now = Utc::now();
    let user = funded_user(&book, dec!(100), CurrencyType::Points).await;

    let temp = due_bet(user, Category::Temperature, Prediction::Range { min: 22.0, max: 23.0 }, now, 0);
    let rain = due_bet(user, Category::Rain, Prediction::Outcome(true), now, 1);
    let wind = due_bet(user, Category::Wind, Prediction::Bucket("breezy".into()), now, 2);
    for bet in [&temp, &rain, &wind] {
        assert_ok!(book.place(bet.clone()).await);
    }

    let settler = settler(engine(&primary, &secondary), log.clone(), &book);
    let run = assert_ok!(settler.settle_city(&berlin(), &[], now).await);

    let report = run.report.as_ref().unwrap();
    assert!(report.summary.all_sources_available);
    assert_eq!(report.summary.disputed_count, 2);
    assert_eq!(report.result(Category::Temperature).unwrap().final_value, ReadingValue::Numeric(22.5));
    assert_eq!(
        report.result(Category::Rain).unwrap().resolution_method,
        Some(ResolutionMethod::ConservativeOr)
    );
    assert_eq!(run.settled_count(), 3);

    for bet in [&temp, &rain, &wind] {
        assert_eq!(book.bet(bet.id).await.unwrap().result, BetResult::Win);
    }

    // 100 - 30 + 3 × 20, plus 10 % on the third consecutive win
    assert_eq!(book.balance(user, CurrencyType::Points).await, dec!(132.00));
    assert_eq!(book.streak(user).await, 3);
    assert_ok!(book.reconcile(user, CurrencyType::Points).await);

    let bonus_entries = book
        .entries(user, CurrencyType::Points)
        .await
        .into_iter()
        .filter(|e| e.transaction_type == TransactionType::BetBonus)
        .count();
    assert_eq!(bonus_entries, 1);

    // Audit trail: override one dispute, bulk-resolve the other
    let disputed = log.disputed().await;
    assert_eq!(disputed.len(), 2);
    let temp_entry = disputed
        .iter()
        .find(|e| e.category == Category::Temperature)
        .unwrap();
    assert_eq!(temp_entry.primary_raw["current"]["temperature_2m"], 20.0);

    let overridden = assert_ok!(
        log.apply_override(
            temp_entry.id,
            OverrideRequest::manual(ReadingValue::Numeric(23.5), "station report", "ops", Utc::now()),
        )
        .await
    );
    assert_eq!(overridden.overrides[0].previous_value, ReadingValue::Numeric(22.5));

    let resolved = assert_ok!(resolve_all_disputed(log.as_ref(), BulkStrategy::UseSecondary, "ops", Utc::now()).await);
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].final_value, ReadingValue::Flag(false));

    let reopened = assert_ok!(JsonlVerificationLog::open(&log_path).await);
    assert!(reopened.disputed().await.is_empty());
    assert_eq!(reopened.entries().await.len(), 3);
}

#[tokio::test]
async fn test_resettlement_is_a_no_op() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    mount_primary(&primary, Some(primary_current(21.0, 0)), 200).await;
    mount_secondary(&secondary, Some(secondary_current(21.4, "Clear")), 200).await;

    let book = InMemoryBook::new();
    let now = Utc::now();
    let user = funded_user(&book, dec!(50), CurrencyType::Real).await;
    let mut bet = due_bet(user, Category::Rain, Prediction::Outcome(false), now, 0);
    bet.currency = CurrencyType::Real;
    assert_ok!(book.place(bet.clone()).await);

    let log: Arc<dyn VerificationLog> = Arc::new(weather_odds::settlement::MemoryVerificationLog::new());
    let settler = settler(engine(&primary, &secondary), log, &book);

    let first = assert_ok!(settler.settle_city(&berlin(), &[], now).await);
    assert_eq!(first.settled_count(), 1);
    let balance = book.balance(user, CurrencyType::Real).await;
    assert_eq!(balance, dec!(60.00));

    // A retry firing the same step again finds nothing to pay
    let verified = first.report.unwrap().verified_values();
    let retried = assert_ok!(settler.settle_bet(&bet, &verified, now).await).unwrap();
    assert!(matches!(
        retried.status,
        weather_odds::ledger::SettleStatus::AlreadySettled(BetResult::Win)
    ));
    assert_eq!(book.balance(user, CurrencyType::Real).await, balance);
    assert_ok!(book.reconcile(user, CurrencyType::Real).await);
}

#[tokio::test]
async fn test_secondary_outage_settles_in_degraded_mode() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    mount_primary(&primary, Some(primary_current(18.0, 0)), 200).await;
    mount_secondary(&secondary, None, 500).await;

    let book = InMemoryBook::new();
    let now = Utc::now();
    let user = funded_user(&book, dec!(20), CurrencyType::Points).await;
    assert_ok!(book.place(due_bet(user, Category::Temperature, Prediction::Range { min: 17.0, max: 19.0 }, now, 0)).await);

    let log: Arc<dyn VerificationLog> = Arc::new(weather_odds::settlement::MemoryVerificationLog::new());
    let settler = settler(engine(&primary, &secondary), log.clone(), &book);

    let run = assert_ok!(settler.settle_city(&berlin(), &[], now).await);
    let report = run.report.as_ref().unwrap();
    assert!(!report.summary.all_sources_available);
    assert_eq!(report.summary.disputed_count, 0);
    assert_eq!(run.settled_count(), 1);

    let entries = log.entries().await;
    assert!(entries.iter().all(|e| !e.all_sources_available));
}

#[tokio::test]
async fn test_primary_outage_leaves_bets_pending() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    mount_primary(&primary, None, 503).await;
    mount_secondary(&secondary, Some(secondary_current(18.0, "Clear")), 200).await;

    let book = InMemoryBook::new();
    let now = Utc::now();
    let user = funded_user(&book, dec!(20), CurrencyType::Points).await;
    let bet = due_bet(user, Category::Rain, Prediction::Outcome(true), now, 0);
    assert_ok!(book.place(bet.clone()).await);

    let log: Arc<dyn VerificationLog> = Arc::new(weather_odds::settlement::MemoryVerificationLog::new());
    let settler = settler(engine(&primary, &secondary), log, &book);

    let err = settler.settle_city(&berlin(), &[], now).await.unwrap_err();
    assert!(matches!(err, SettlementError::PrimaryUnavailable(_)));
    assert!(book.bet(bet.id).await.unwrap().result.is_pending());
    assert_eq!(book.balance(user, CurrencyType::Points).await, dec!(10));
}
