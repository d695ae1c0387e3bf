//! Pricing model module
//!
//! Historical accuracy, the volatility uplift derived from it and the
//! informational difficulty rating

mod accuracy;
mod difficulty;
mod volatility;

pub use accuracy::{AccuracySource, AccuracySummary, JsonFileAccuracySource, MemoryAccuracySource};
pub use difficulty::{
    forecast_uncertainty, Difficulty, DifficultyFactors, DifficultyLevel, DifficultyRating,
};
pub use volatility::{recency_weights, volatility_bonus, Volatility, VolatilityModel};
