//! Configuration loading

use chrono::Utc;
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio_test::assert_ok;
use weather_odds::bet::Category;
use weather_odds::cache::{Clock, ManualClock};
use weather_odds::cashout::{CashOutDesk, CashOutPoller, CashOutValuationModel};
use weather_odds::config::Config;
use weather_odds::ledger::InMemoryBook;
use weather_odds::telemetry::LogFormat;
use weather_odds::weather::{ForecastCache, OpenMeteoClient, OpenMeteoConfig, WeatherProvider};

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = assert_ok!(Config::load(path));

    assert_eq!(config.odds.house_edge_pct, dec!(5));
    assert_eq!(config.odds.min_odds, dec!(1.10));
    assert_eq!(config.settlement.thresholds.get(Category::DewPoint), 3.0);
    assert_eq!(config.cashout.partial_penalty_pct, dec!(15));
    assert_eq!(config.streak.tiers.len(), 6);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert!(config.city("berlin").is_some());
    assert!(config.settlement.audit_log.is_none());
}

#[test]
fn test_partial_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [cashout]
        full_penalty_pct = 12.5

        [settlement]
        audit_log = "/var/lib/weather-odds/verifications.jsonl"

        [[cities]]
        name = "Oslo"
        latitude = 59.91
        longitude = 10.75
        "#
    )
    .unwrap();

    let config = assert_ok!(Config::load(file.path()));
    assert_eq!(config.cashout.full_penalty_pct, dec!(12.5));
    assert_eq!(config.cashout.partial_penalty_pct, dec!(15));
    assert_eq!(config.cashout.min_minutes_before_expiry, 30);
    assert!(config.settlement.audit_log.is_some());
    assert_eq!(config.settlement.fetch_timeout_secs, 15);
    assert_eq!(config.cities[0].name, "Oslo");
}

#[tokio::test]
async fn test_timing_settings_take_effect() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [weather]
        forecast_cache_ttl_secs = 90

        [cashout]
        poll_interval_secs = 7
        "#
    )
    .unwrap();
    let config = assert_ok!(Config::load(file.path()));

    let provider: Arc<dyn WeatherProvider> = Arc::new(OpenMeteoClient::with_config(OpenMeteoConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout: StdDuration::from_secs(1),
    }));
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
    let forecasts = Arc::new(ForecastCache::from_config(
        provider.clone(),
        clock.clone(),
        &config.weather,
    ));
    assert_eq!(forecasts.ttl(), chrono::Duration::seconds(90));

    let desk = Arc::new(CashOutDesk::new(
        CashOutValuationModel::new(config.cashout.clone()),
        Arc::new(InMemoryBook::new()),
        forecasts,
        provider,
        config.cities.clone(),
    ));
    let poller = CashOutPoller::from_config(desk, clock, &config.cashout, None);
    assert_eq!(poller.interval(), StdDuration::from_secs(7));
    poller.shutdown().await;
}

#[test]
fn test_invalid_config_rejected() {
    assert!(Config::parse("[odds]\nmin_odds = \"lots\"").is_err());
    assert!(Config::parse("[telemetry]\nlog_format = \"xml\"").is_err());
}
