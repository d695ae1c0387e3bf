//! Static bucket tables for categories without a live probability
//!
//! The same bounds price a bucket bet and grade it, so a bucket's
//! `[min, max)` interval is the definition of a win.

use crate::bet::Category;

/// A labeled half-open interval with its base odds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub base_odds: f64,
}

impl Bucket {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    pub fn midpoint(&self) -> f64 {
        match (self.min.is_finite(), self.max.is_finite()) {
            (true, true) => (self.min + self.max) / 2.0,
            (true, false) => self.min,
            (false, true) => self.max,
            (false, false) => 0.0,
        }
    }
}

const fn bucket(label: &'static str, min: f64, max: f64, base_odds: f64) -> Bucket {
    Bucket {
        label,
        min,
        max,
        base_odds,
    }
}

const INF: f64 = f64::INFINITY;
const NEG_INF: f64 = f64::NEG_INFINITY;

/// km/h
const WIND: &[Bucket] = &[
    bucket("calm", 0.0, 10.0, 2.2),
    bucket("breezy", 10.0, 25.0, 1.8),
    bucket("windy", 25.0, 40.0, 2.6),
    bucket("strong", 40.0, 60.0, 4.5),
    bucket("gale", 60.0, INF, 9.0),
];

/// hPa
const PRESSURE: &[Bucket] = &[
    bucket("low", NEG_INF, 1000.0, 3.2),
    bucket("below_normal", 1000.0, 1010.0, 2.2),
    bucket("normal", 1010.0, 1020.0, 1.7),
    bucket("high", 1020.0, INF, 2.6),
];

/// °C
const DEW_POINT: &[Bucket] = &[
    bucket("dry", NEG_INF, 5.0, 2.4),
    bucket("comfortable", 5.0, 13.0, 1.9),
    bucket("humid", 13.0, 18.0, 2.3),
    bucket("oppressive", 18.0, INF, 3.6),
];

/// %
const CLOUD_COVERAGE: &[Bucket] = &[
    bucket("clear", 0.0, 20.0, 2.5),
    bucket("partly_cloudy", 20.0, 50.0, 2.0),
    bucket("mostly_cloudy", 50.0, 80.0, 2.1),
    bucket("overcast", 80.0, INF, 2.4),
];

/// mm
const RAINFALL: &[Bucket] = &[
    bucket("none", 0.0, 0.1, 1.6),
    bucket("light", 0.1, 2.5, 2.3),
    bucket("moderate", 2.5, 10.0, 3.4),
    bucket("heavy", 10.0, INF, 6.0),
];

/// %
const HUMIDITY: &[Bucket] = &[
    bucket("dry", 0.0, 30.0, 3.0),
    bucket("comfortable", 30.0, 60.0, 1.8),
    bucket("humid", 60.0, 80.0, 2.0),
    bucket("very_humid", 80.0, INF, 2.8),
];

/// Base odds for snow yes/no
const SNOW_YES: f64 = 6.0;
const SNOW_NO: f64 = 1.15;

/// Lookup over the static tables
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketTable;

impl BucketTable {
    /// Buckets for a category; temperature and rain are priced live
    pub fn buckets(&self, category: Category) -> &'static [Bucket] {
        match category {
            Category::Wind => WIND,
            Category::Pressure => PRESSURE,
            Category::DewPoint => DEW_POINT,
            Category::CloudCoverage => CLOUD_COVERAGE,
            Category::Rainfall => RAINFALL,
            Category::Humidity => HUMIDITY,
            Category::Temperature | Category::Rain | Category::Snow => &[],
        }
    }

    /// Bucket by label (case-insensitive, spaces and dashes as underscores)
    pub fn find(&self, category: Category, label: &str) -> Option<&'static Bucket> {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        self.buckets(category)
            .iter()
            .find(|b| b.label == normalized)
    }

    /// Bucket containing a value
    pub fn bucket_for(&self, category: Category, value: f64) -> Option<&'static Bucket> {
        self.buckets(category).iter().find(|b| b.contains(value))
    }

    /// Static base odds for a snow outcome
    pub fn snow_odds(&self, snows: bool) -> f64 {
        if snows {
            SNOW_YES
        } else {
            SNOW_NO
        }
    }
}
