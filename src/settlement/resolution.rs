//! Deviation, dispute detection and resolution
//!
//! Pure functions of the two readings and the category.

use super::{CategoryVerification, ResolutionMethod};
use crate::bet::Category;
use crate::weather::ReadingValue;

/// Deviation between two readings
///
/// Numeric categories use the absolute difference in native units; binary
/// categories are 0 when the sources agree and 100 when they do not.
pub fn deviation(category: Category, primary: ReadingValue, secondary: ReadingValue) -> f64 {
    if category.is_binary() {
        let agree = match (primary, secondary) {
            (ReadingValue::Flag(a), ReadingValue::Flag(b)) => a == b,
            _ => primary == secondary,
        };
        return if agree { 0.0 } else { 100.0 };
    }

    match (primary.as_f64(), secondary.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs(),
        _ => 0.0,
    }
}

/// A dispute is a deviation strictly above the threshold
pub fn is_disputed(deviation: f64, threshold: f64) -> bool {
    deviation > threshold
}

/// Confidence degrades linearly with deviation relative to the threshold
pub fn confidence(deviation: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return if deviation == 0.0 { 100.0 } else { 0.0 };
    }
    (100.0 - (deviation / threshold) * 50.0).max(0.0)
}

/// Category-specific choice of the authoritative value for a dispute
pub fn resolve_dispute(
    category: Category,
    primary: ReadingValue,
    secondary: ReadingValue,
) -> (ResolutionMethod, ReadingValue) {
    match category {
        Category::Temperature
        | Category::Wind
        | Category::Humidity
        | Category::Pressure
        | Category::CloudCoverage => (ResolutionMethod::Average, average(primary, secondary)),
        Category::Rain | Category::Snow => {
            (ResolutionMethod::ConservativeOr, either(primary, secondary))
        }
        Category::Rainfall => (ResolutionMethod::ConservativeMax, max(primary, secondary)),
        Category::DewPoint => (ResolutionMethod::PrimarySource, primary),
    }
}

/// Mean of numeric readings; flags combine by OR
pub fn average(a: ReadingValue, b: ReadingValue) -> ReadingValue {
    match (a, b) {
        (ReadingValue::Numeric(x), ReadingValue::Numeric(y)) => ReadingValue::Numeric((x + y) / 2.0),
        _ => either(a, b),
    }
}

fn either(a: ReadingValue, b: ReadingValue) -> ReadingValue {
    ReadingValue::Flag(a.as_flag().unwrap_or(false) || b.as_flag().unwrap_or(false))
}

fn max(a: ReadingValue, b: ReadingValue) -> ReadingValue {
    match (a, b) {
        (ReadingValue::Numeric(x), ReadingValue::Numeric(y)) => ReadingValue::Numeric(x.max(y)),
        _ => a,
    }
}

/// Reconcile one category's two readings
pub fn verify_category(
    category: Category,
    primary: ReadingValue,
    secondary: ReadingValue,
    threshold: f64,
) -> CategoryVerification {
    let deviation = deviation(category, primary, secondary);
    let disputed = is_disputed(deviation, threshold);

    let (resolution_method, final_value) = if disputed {
        let (method, value) = resolve_dispute(category, primary, secondary);
        (Some(method), value)
    } else {
        (None, primary)
    };

    CategoryVerification {
        category,
        primary_value: primary,
        secondary_value: secondary,
        deviation,
        is_disputed: disputed,
        resolution_method,
        final_value,
        confidence_score: confidence(deviation, threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReadingValue::{Flag, Numeric};

    #[test]
    fn test_temperature_dispute_averages() {
        let v = verify_category(Category::Temperature, Numeric(20.0), Numeric(25.0), 3.0);
        assert_eq!(v.deviation, 5.0);
        assert!(v.is_disputed);
        assert_eq!(v.resolution_method, Some(ResolutionMethod::Average));
        assert_eq!(v.final_value, Numeric(22.5));
        assert_eq!(v.final_value.to_string(), "22.5");
        // 100 - (5 / 3) * 50
        assert!((v.confidence_score - 16.666_666_666_666_67).abs() < 1e-9);
    }

    #[test]
    fn test_binary_disagreement_is_conservative_or() {
        let v = verify_category(Category::Rain, Flag(true), Flag(false), 0.0);
        assert_eq!(v.deviation, 100.0);
        assert!(v.is_disputed);
        assert_eq!(v.resolution_method, Some(ResolutionMethod::ConservativeOr));
        assert_eq!(v.final_value.to_string(), "yes");
        assert_eq!(v.confidence_score, 0.0);

        let snow = verify_category(Category::Snow, Flag(false), Flag(true), 0.0);
        assert_eq!(snow.final_value, Flag(true));
    }

    #[test]
    fn test_binary_agreement() {
        let v = verify_category(Category::Rain, Flag(false), Flag(false), 0.0);
        assert!(!v.is_disputed);
        assert_eq!(v.resolution_method, None);
        assert_eq!(v.final_value, Flag(false));
        assert_eq!(v.confidence_score, 100.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let at = verify_category(Category::Wind, Numeric(10.0), Numeric(20.0), 10.0);
        assert!(!at.is_disputed);
        assert_eq!(at.final_value, Numeric(10.0));
        assert_eq!(at.confidence_score, 50.0);

        let above = verify_category(Category::Wind, Numeric(10.0), Numeric(20.5), 10.0);
        assert!(above.is_disputed);
    }

    #[test]
    fn test_rainfall_takes_max() {
        let (method, value) = resolve_dispute(Category::Rainfall, Numeric(2.0), Numeric(9.0));
        assert_eq!(method, ResolutionMethod::ConservativeMax);
        assert_eq!(value, Numeric(9.0));
    }

    #[test]
    fn test_dew_point_keeps_primary() {
        let (method, value) = resolve_dispute(Category::DewPoint, Numeric(8.0), Numeric(14.0));
        assert_eq!(method, ResolutionMethod::PrimarySource);
        assert_eq!(value, Numeric(8.0));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        for category in Category::ALL {
            let (p, s) = if category.is_binary() {
                (Flag(true), Flag(false))
            } else {
                (Numeric(12.0), Numeric(40.0))
            };
            assert_eq!(resolve_dispute(category, p, s), resolve_dispute(category, p, s));
        }
    }

    #[test]
    fn test_confidence_floor() {
        assert_eq!(confidence(100.0, 3.0), 0.0);
        assert_eq!(confidence(0.0, 3.0), 100.0);
    }
}
