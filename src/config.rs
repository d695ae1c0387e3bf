//! Configuration types for weather-odds

use crate::bet::Category;
use crate::telemetry::LogFormat;
use crate::weather::City;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that replaces `weather.secondary_api_key`
pub const SECONDARY_API_KEY_ENV: &str = "WEATHER_ODDS_SECONDARY_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub odds: OddsConfig,
    #[serde(default)]
    pub volatility: VolatilityConfig,
    #[serde(default)]
    pub difficulty: DifficultyConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub cashout: CashOutConfig,
    #[serde(default)]
    pub streak: StreakConfig,
    #[serde(default)]
    pub bonus: BonusConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub cities: Vec<City>,
}

/// Weather provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    #[serde(default = "default_secondary_url")]
    pub secondary_url: String,
    #[serde(default)]
    pub secondary_api_key: String,
    /// Query the secondary provider by city name instead of coordinates
    #[serde(default)]
    pub secondary_query_by_name: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Days of forecast fetched for pricing
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
    #[serde(default = "default_cache_ttl_secs")]
    pub forecast_cache_ttl_secs: u64,
}

fn default_primary_url() -> String {
    crate::weather::OPEN_METEO_URL.to_string()
}
fn default_secondary_url() -> String {
    crate::weather::OPENWEATHER_URL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_forecast_days() -> u32 {
    7
}
fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            secondary_url: default_secondary_url(),
            secondary_api_key: String::new(),
            secondary_query_by_name: false,
            request_timeout_secs: 10,
            forecast_days: 7,
            forecast_cache_ttl_secs: 300,
        }
    }
}

/// Per-category multipliers applied after the base odds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryMultipliers {
    pub temperature: Decimal,
    pub rain: Decimal,
    pub rainfall: Decimal,
    pub wind: Decimal,
    pub humidity: Decimal,
    pub pressure: Decimal,
    pub cloud_coverage: Decimal,
    pub dew_point: Decimal,
    pub snow: Decimal,
}

impl CategoryMultipliers {
    pub fn get(&self, category: Category) -> Decimal {
        match category {
            Category::Temperature => self.temperature,
            Category::Rain => self.rain,
            Category::Rainfall => self.rainfall,
            Category::Wind => self.wind,
            Category::Humidity => self.humidity,
            Category::Pressure => self.pressure,
            Category::CloudCoverage => self.cloud_coverage,
            Category::DewPoint => self.dew_point,
            Category::Snow => self.snow,
        }
    }
}

impl Default for CategoryMultipliers {
    fn default() -> Self {
        Self {
            temperature: Decimal::ONE,
            rain: Decimal::ONE,
            rainfall: Decimal::ONE,
            wind: Decimal::ONE,
            humidity: Decimal::ONE,
            pressure: Decimal::ONE,
            cloud_coverage: Decimal::ONE,
            dew_point: Decimal::ONE,
            snow: Decimal::ONE,
        }
    }
}

/// Odds pricing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OddsConfig {
    #[serde(default = "default_house_edge_pct")]
    pub house_edge_pct: Decimal,
    #[serde(default = "default_min_odds")]
    pub min_odds: Decimal,
    #[serde(default = "default_max_odds")]
    pub max_odds: Decimal,
    /// Returned when a bet cannot be priced
    #[serde(default = "default_default_odds")]
    pub default_odds: Decimal,
    #[serde(default = "default_one")]
    pub global_multiplier: Decimal,
    #[serde(default = "default_max_parlay_odds")]
    pub max_parlay_odds: Decimal,
    #[serde(default)]
    pub category_multipliers: CategoryMultipliers,
}

fn default_house_edge_pct() -> Decimal {
    dec!(5)
}
fn default_min_odds() -> Decimal {
    dec!(1.10)
}
fn default_max_odds() -> Decimal {
    dec!(50)
}
fn default_default_odds() -> Decimal {
    dec!(2.0)
}
fn default_one() -> Decimal {
    Decimal::ONE
}
fn default_max_parlay_odds() -> Decimal {
    dec!(100)
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            house_edge_pct: dec!(5),
            min_odds: dec!(1.10),
            max_odds: dec!(50),
            default_odds: dec!(2.0),
            global_multiplier: Decimal::ONE,
            max_parlay_odds: dec!(100),
            category_multipliers: CategoryMultipliers::default(),
        }
    }
}

/// Historical accuracy volatility configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VolatilityConfig {
    /// Weight of the most recent month; the rest is split evenly
    #[serde(default = "default_recent_weight")]
    pub recent_weight: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    /// Accuracy (%) at or above which no bonus is granted
    #[serde(default = "default_baseline_accuracy")]
    pub baseline_accuracy: f64,
    #[serde(default = "default_max_bonus")]
    pub max_bonus: f64,
    #[serde(default = "default_curve_exponent")]
    pub curve_exponent: f64,
    #[serde(default = "default_window_months")]
    pub window_months: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// JSON file of monthly accuracy summaries
    #[serde(default)]
    pub accuracy_file: Option<PathBuf>,
}

fn default_recent_weight() -> f64 {
    0.7
}
fn default_min_samples() -> u64 {
    5
}
fn default_baseline_accuracy() -> f64 {
    80.0
}
fn default_max_bonus() -> f64 {
    0.40
}
fn default_curve_exponent() -> f64 {
    0.7
}
fn default_window_months() -> usize {
    6
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            recent_weight: 0.7,
            min_samples: 5,
            baseline_accuracy: 80.0,
            max_bonus: 0.40,
            curve_exponent: 0.7,
            window_months: 6,
            cache_ttl_secs: 300,
            accuracy_file: None,
        }
    }
}

/// Difficulty rating configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    pub volatility_weight: f64,
    pub time_weight: f64,
    pub uncertainty_weight: f64,
    /// Upper bounds (exclusive) of Easy, Medium and Hard
    pub easy_below: f64,
    pub medium_below: f64,
    pub hard_below: f64,
    pub time_bonus_per_day_pct: f64,
    pub max_time_bonus_pct: f64,
    /// Volatility bonus (%) that scores as maximally difficult
    pub volatility_ceiling_pct: f64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            volatility_weight: 0.35,
            time_weight: 0.30,
            uncertainty_weight: 0.35,
            easy_below: 0.35,
            medium_below: 0.60,
            hard_below: 0.80,
            time_bonus_per_day_pct: 5.0,
            max_time_bonus_pct: 30.0,
            volatility_ceiling_pct: 40.0,
        }
    }
}

/// Per-category dispute thresholds in native units
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisputeThresholds {
    pub temperature: f64,
    pub rain: f64,
    pub rainfall: f64,
    pub wind: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub cloud_coverage: f64,
    pub dew_point: f64,
    pub snow: f64,
}

impl DisputeThresholds {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Temperature => self.temperature,
            Category::Rain => self.rain,
            Category::Rainfall => self.rainfall,
            Category::Wind => self.wind,
            Category::Humidity => self.humidity,
            Category::Pressure => self.pressure,
            Category::CloudCoverage => self.cloud_coverage,
            Category::DewPoint => self.dew_point,
            Category::Snow => self.snow,
        }
    }
}

impl Default for DisputeThresholds {
    fn default() -> Self {
        Self {
            temperature: 3.0,
            rain: 0.0,
            rainfall: 5.0,
            wind: 10.0,
            humidity: 15.0,
            pressure: 10.0,
            cloud_coverage: 20.0,
            dew_point: 3.0,
            snow: 0.0,
        }
    }
}

/// Settlement configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Upper bound on each provider fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// JSON-lines verification audit log; in-memory when unset
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
    #[serde(default)]
    pub thresholds: DisputeThresholds,
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 15,
            audit_log: None,
            thresholds: DisputeThresholds::default(),
        }
    }
}

/// Cash-out valuation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CashOutConfig {
    /// Percentage of stake offered with no elapsed time and no favorable weather
    pub base_pct: Decimal,
    pub max_time_bonus_pct: Decimal,
    pub max_weather_bonus_pct: Decimal,
    pub full_penalty_pct: Decimal,
    pub partial_penalty_pct: Decimal,
    pub min_minutes_before_expiry: i64,
    pub poll_interval_secs: u64,
}

impl Default for CashOutConfig {
    fn default() -> Self {
        Self {
            base_pct: dec!(50),
            max_time_bonus_pct: dec!(25),
            max_weather_bonus_pct: dec!(50),
            full_penalty_pct: dec!(10),
            partial_penalty_pct: dec!(15),
            min_minutes_before_expiry: 30,
            poll_interval_secs: 30,
        }
    }
}

/// A streak length and the multiplier it unlocks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreakTier {
    pub streak: u32,
    pub multiplier: Decimal,
}

/// Win streak bonus configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreakConfig {
    pub min_streak: u32,
    pub max_multiplier: Decimal,
    pub tiers: Vec<StreakTier>,
}

impl Default for StreakConfig {
    fn default() -> Self {
        let tier = |streak, multiplier| StreakTier { streak, multiplier };
        Self {
            min_streak: 3,
            max_multiplier: dec!(2.0),
            tiers: vec![
                tier(3, dec!(1.10)),
                tier(5, dec!(1.20)),
                tier(7, dec!(1.35)),
                tier(10, dec!(1.50)),
                tier(15, dec!(1.75)),
                tier(20, dec!(2.00)),
            ],
        }
    }
}

/// Bonus earnings configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BonusConfig {
    /// Cap on streak × boost multipliers combined
    pub max_total_multiplier: Decimal,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            max_total_multiplier: dec!(3.0),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text, then apply environment overrides
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(SECONDARY_API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.weather.secondary_api_key = key;
        }
    }

    /// Configured city by case-insensitive name
    pub fn city(&self, name: &str) -> Option<&City> {
        self.cities
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
