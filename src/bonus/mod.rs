//! Bonus module
//!
//! Win streak multipliers and shop-item boosts layered on settlement payouts

mod earnings;
mod streak;

pub use earnings::{ActiveBoost, BonusBreakdown, BonusEarnings, BoostStore};
pub use streak::StreakBonus;
