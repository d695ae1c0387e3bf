//! CLI interface for weather-odds
//!
//! Provides subcommands for:
//! - `quote`: Price a prediction from the live forecast
//! - `verify`: Cross-check both weather sources for a city
//! - `disputes`: List, bulk-resolve or override disputed verifications
//! - `streak`: Show the multiplier for a win streak
//! - `config`: Show configuration

mod disputes;
mod quote;
mod streak;
mod verify;

pub use disputes::{DisputesAction, DisputesArgs};
pub use quote::QuoteArgs;
pub use streak::StreakArgs;
pub use verify::VerifyArgs;

use crate::config::Config;
use crate::settlement::{JsonlVerificationLog, MemoryVerificationLog, VerificationLog};
use crate::weather::{
    City, OpenMeteoClient, OpenMeteoConfig, OpenWeatherClient, OpenWeatherConfig, WeatherProvider,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "weather-odds")]
#[command(about = "Dynamic odds, settlement and cash-out valuation for weather bets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Price a prediction
    Quote(QuoteArgs),
    /// Verify current weather against both sources
    Verify(VerifyArgs),
    /// Manage disputed verifications
    Disputes(DisputesArgs),
    /// Show the streak multiplier
    Streak(StreakArgs),
    /// Show configuration
    Config,
}

/// Look up a configured city by name
pub(crate) fn find_city(config: &Config, name: &str) -> anyhow::Result<City> {
    config
        .city(name)
        .cloned()
        .with_context(|| format!("City '{name}' is not configured"))
}

pub(crate) fn primary_provider(config: &Config) -> Arc<dyn WeatherProvider> {
    Arc::new(OpenMeteoClient::with_config(OpenMeteoConfig {
        base_url: config.weather.primary_url.clone(),
        timeout: Duration::from_secs(config.weather.request_timeout_secs),
    }))
}

pub(crate) fn secondary_provider(config: &Config) -> Arc<dyn WeatherProvider> {
    Arc::new(OpenWeatherClient::with_config(OpenWeatherConfig {
        base_url: config.weather.secondary_url.clone(),
        api_key: config.weather.secondary_api_key.clone(),
        timeout: Duration::from_secs(config.weather.request_timeout_secs),
        query_by_name: config.weather.secondary_query_by_name,
    }))
}

/// Verification log from config; in-memory when no file is configured
pub(crate) async fn open_verification_log(config: &Config) -> anyhow::Result<Arc<dyn VerificationLog>> {
    match &config.settlement.audit_log {
        Some(path) => {
            let log = JsonlVerificationLog::open(path)
                .await
                .with_context(|| format!("Failed to open audit log {}", path.display()))?;
            Ok(Arc::new(log))
        }
        None => {
            tracing::warn!("settlement.audit_log not set, verifications will not be persisted");
            Ok(Arc::new(MemoryVerificationLog::new()))
        }
    }
}
