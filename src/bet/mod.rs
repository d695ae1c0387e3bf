//! Bet domain module
//!
//! Categories, predictions and the bet record shared by pricing,
//! settlement and cash-out

mod category;
mod parlay;
mod types;

pub use category::{Category, UnknownCategory};
pub use parlay::{joint_result, Parlay};
pub use types::{
    Bet, BetId, BetResult, CurrencyType, InvalidPrediction, Prediction, UserId,
};
