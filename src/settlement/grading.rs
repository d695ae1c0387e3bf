//! Bet grading against verified values

use crate::bet::{Bet, BetResult, Category, Prediction};
use crate::odds::BucketTable;
use crate::weather::ReadingValue;
use std::collections::HashMap;

/// Grade a bet; `None` when it cannot be decided from the verified values
pub fn grade(
    bet: &Bet,
    verified: &HashMap<Category, ReadingValue>,
    table: &BucketTable,
) -> Option<BetResult> {
    let value = verified.get(&bet.category)?;
    let won = prediction_holds(bet.category, &bet.prediction, *value, table)?;
    Some(if won { BetResult::Win } else { BetResult::Loss })
}

/// Whether a prediction matches a value
pub fn prediction_holds(
    category: Category,
    prediction: &Prediction,
    value: ReadingValue,
    table: &BucketTable,
) -> Option<bool> {
    match (prediction, value) {
        (Prediction::Outcome(expected), ReadingValue::Flag(actual)) => Some(*expected == actual),
        (Prediction::Range { min, max }, ReadingValue::Numeric(v)) => Some(v >= *min && v <= *max),
        (Prediction::Bucket(label), ReadingValue::Numeric(v)) => {
            table.find(category, label).map(|b| b.contains(v))
        }
        // Shape mismatch, e.g. a range on a yes/no category
        _ => None,
    }
}
