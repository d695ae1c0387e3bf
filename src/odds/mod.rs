//! Odds pricing module
//!
//! Live probability pricing for rain, distance pricing for temperature
//! bands and static tables for everything else

mod engine;
mod table;

pub use engine::{probability_odds, range_distance, range_odds, OddsEngine};
pub use table::{Bucket, BucketTable};

use rust_decimal::Decimal;

/// Implied probability of decimal odds, `None` at or below evens-minus-stake
pub fn implied_probability(odds: Decimal) -> Option<Decimal> {
    if odds <= Decimal::ONE {
        return None;
    }
    Some(Decimal::ONE / odds)
}
