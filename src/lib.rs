//! weather-odds: Pricing, settlement and cash-out engine for weather prediction bets
//!
//! This library provides the core components for:
//! - Odds from live forecast probabilities and static bucket tables
//! - Volatility uplift from historical forecast accuracy
//! - Informational difficulty ratings
//! - Dual-source weather verification with dispute resolution and an audit log
//! - Idempotent bet grading and payout with streak and boost bonuses
//! - Live cash-out valuation, full and partial
//! - Ledger-backed bet book
//! - Full observability stack

pub mod bet;
pub mod bonus;
pub mod cache;
pub mod cashout;
pub mod cli;
pub mod config;
pub mod ledger;
pub mod model;
pub mod odds;
pub mod settlement;
pub mod telemetry;
pub mod weather;
