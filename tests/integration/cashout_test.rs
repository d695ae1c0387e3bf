//! Cash-out against live forecasts and concurrent settlement

use crate::support::*;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio_test::assert_ok;
use weather_odds::bet::{Bet, BetResult, Category, CurrencyType, Prediction};
use weather_odds::cache::{Clock, ManualClock};
use weather_odds::cashout::{CashOutDesk, CashOutError, CashOutPoller, CashOutValuationModel};
use weather_odds::config::CashOutConfig;
use weather_odds::ledger::{BetBook, CashOutKind, InMemoryBook, SettleStatus, Settlement};
use weather_odds::weather::{ForecastCache, OpenMeteoClient, OpenMeteoConfig, WeatherProvider};
use wiremock::MockServer;

async fn desk(server: &MockServer, book: &InMemoryBook) -> CashOutDesk {
    let provider: Arc<dyn WeatherProvider> = Arc::new(OpenMeteoClient::with_config(OpenMeteoConfig {
        base_url: server.uri(),
        timeout: StdDuration::from_secs(5),
    }));
    let forecasts = Arc::new(ForecastCache::new(
        provider.clone(),
        Arc::new(ManualClock::new(Utc::now())),
        Duration::minutes(5),
    ));
    CashOutDesk::new(
        CashOutValuationModel::new(CashOutConfig::default()),
        Arc::new(book.clone()),
        forecasts,
        provider,
        vec![berlin()],
    )
}

async fn open_rain_bet(book: &InMemoryBook) -> Bet {
    let now = Utc::now();
    let user = funded_user(book, dec!(100), CurrencyType::Points).await;
    let bet = Bet::new(
        user,
        "Berlin",
        Category::Rain,
        Prediction::Outcome(true),
        dec!(40),
        dec!(2.5),
        CurrencyType::Points,
        now.date_naive() + Duration::days(1),
        now + Duration::days(1),
    )
    .placed_at(now - Duration::days(1));
    assert_ok!(book.place(bet).await)
}

#[tokio::test]
async fn test_quote_uses_forecast_probability() {
    let server = MockServer::start().await;
    mount_primary_daily(&server, primary_daily(3, 90.0)).await;

    let book = InMemoryBook::new();
    let bet = open_rain_bet(&book).await;
    let desk = desk(&server, &book).await;

    let wet = assert_ok!(desk.quote(bet.id, CashOutKind::Full, Utc::now()).await);
    assert!((wet.favorability - 0.9).abs() < 1e-9);
    assert!(wet.calculation.amount > Decimal::ZERO);
    assert!(wet.calculation.amount <= bet.potential_payout());

    let partial = assert_ok!(
        desk.quote(bet.id, CashOutKind::Partial { fraction: dec!(0.5) }, Utc::now())
            .await
    );
    assert!(partial.calculation.percentage < wet.calculation.percentage);
}

#[tokio::test]
async fn test_cash_out_races_settlement() {
    let server = MockServer::start().await;
    mount_primary_daily(&server, primary_daily(3, 50.0)).await;

    let book = InMemoryBook::new();
    let bet = open_rain_bet(&book).await;
    let desk = desk(&server, &book).await;
    let now = Utc::now();

    let quote = assert_ok!(desk.quote(bet.id, CashOutKind::Full, now).await);
    let payout = (bet.stake * bet.odds).round_dp(2);

    let (settled, cashed) = tokio::join!(
        book.settle(bet.id, Settlement::win(payout, Decimal::ZERO, now)),
        desk.confirm(&quote, now),
    );

    let settled = assert_ok!(settled);
    let final_bet = book.bet(bet.id).await.unwrap();
    let balance = book.balance(bet.user_id, CurrencyType::Points).await;

    // Exactly one of the two transitions wins
    match (&settled, &cashed) {
        (SettleStatus::Settled { .. }, Err(CashOutError::NotPending { result, .. })) => {
            assert_eq!(*result, BetResult::Win);
            assert_eq!(final_bet.result, BetResult::Win);
            assert_eq!(balance, dec!(60) + payout);
        }
        (SettleStatus::AlreadySettled(BetResult::CashedOut), Ok(_)) => {
            assert_eq!(final_bet.result, BetResult::CashedOut);
            assert_eq!(balance, dec!(60) + quote.calculation.amount);
        }
        other => panic!("unexpected race outcome: {other:?}"),
    }
    assert_ok!(book.reconcile(bet.user_id, CurrencyType::Points).await);
}

#[tokio::test]
async fn test_partial_then_full_cash_out() {
    let server = MockServer::start().await;
    mount_primary_daily(&server, primary_daily(3, 70.0)).await;

    let book = InMemoryBook::new();
    let bet = open_rain_bet(&book).await;
    let desk = desk(&server, &book).await;
    let now = Utc::now();

    let reduced = assert_ok!(desk.partial_cash_out(bet.id, dec!(0.25), now).await);
    assert_eq!(reduced.stake, dec!(30.00));
    assert!(reduced.result.is_pending());

    let closed = assert_ok!(desk.cash_out(bet.id, now).await);
    assert_eq!(closed.result, BetResult::CashedOut);
    assert!(closed.cashout_amount.unwrap() > Decimal::ZERO);

    let err = desk.cash_out(bet.id, now).await.unwrap_err();
    assert!(matches!(err, CashOutError::NotPending { .. }));
    assert_ok!(book.reconcile(bet.user_id, CurrencyType::Points).await);
}

#[tokio::test]
async fn test_poller_publishes_valuations() {
    let server = MockServer::start().await;
    mount_primary_daily(&server, primary_daily(3, 40.0)).await;

    let book = InMemoryBook::new();
    let bet = open_rain_bet(&book).await;
    let desk = Arc::new(desk(&server, &book).await);
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

    let poller = CashOutPoller::spawn(desk, clock, StdDuration::from_millis(25), None);
    let mut rx = poller.subscribe();
    assert_ok!(tokio::time::timeout(StdDuration::from_secs(5), rx.changed()).await);

    let valuations = poller.latest();
    let quote = valuations.get(&bet.id).unwrap();
    assert!((quote.favorability - 0.4).abs() < 1e-9);

    poller.shutdown().await;
}
