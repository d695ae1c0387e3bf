//! Settlement types

use super::AuditError;
use crate::ledger::BookError;
use crate::bet::Category;
use crate::weather::{ReadingValue, WeatherError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// How the final value of a category was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Mean of both readings
    Average,
    /// Event counted if either source reports it
    ConservativeOr,
    /// Higher reading wins
    ConservativeMax,
    /// Primary reading kept
    PrimarySource,
    /// Administrator supplied the value
    AdminOverride,
    AdminPrimary,
    AdminSecondary,
    AdminAverage,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Average => "average",
            ResolutionMethod::ConservativeOr => "conservative_or",
            ResolutionMethod::ConservativeMax => "conservative_max",
            ResolutionMethod::PrimarySource => "primary_source",
            ResolutionMethod::AdminOverride => "admin_override",
            ResolutionMethod::AdminPrimary => "admin_primary",
            ResolutionMethod::AdminSecondary => "admin_secondary",
            ResolutionMethod::AdminAverage => "admin_average",
        }
    }

    /// Methods only an administrator may apply
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            ResolutionMethod::AdminOverride
                | ResolutionMethod::AdminPrimary
                | ResolutionMethod::AdminSecondary
                | ResolutionMethod::AdminAverage
        )
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciled result for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryVerification {
    pub category: Category,
    pub primary_value: ReadingValue,
    pub secondary_value: ReadingValue,
    /// Native units for numeric categories, 0 or 100 for binary ones
    #[serde(rename = "deviation_percentage")]
    pub deviation: f64,
    pub is_disputed: bool,
    pub resolution_method: Option<ResolutionMethod>,
    pub final_value: ReadingValue,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSummary {
    pub disputed_count: usize,
    pub disputed_categories: Vec<Category>,
    pub average_confidence: f64,
    pub all_sources_available: bool,
}

/// Output of one verification pass for a city
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub city: String,
    pub verified_at: DateTime<Utc>,
    pub results: Vec<CategoryVerification>,
    pub summary: VerificationSummary,
    /// Provider payloads kept for the audit log
    #[serde(skip)]
    pub primary_raw: serde_json::Value,
    #[serde(skip)]
    pub secondary_raw: Option<serde_json::Value>,
}

impl VerificationReport {
    /// Authoritative value per category, the input to bet grading
    pub fn verified_values(&self) -> HashMap<Category, ReadingValue> {
        self.results
            .iter()
            .map(|r| (r.category, r.final_value))
            .collect()
    }

    pub fn result(&self, category: Category) -> Option<&CategoryVerification> {
        self.results.iter().find(|r| r.category == category)
    }
}

/// Settlement errors
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Primary weather source unavailable: {0}")]
    PrimaryUnavailable(#[source] WeatherError),
    #[error("Failed to persist verification: {0}")]
    Audit(#[from] AuditError),
    #[error("Failed to commit settlement: {0}")]
    Book(#[from] BookError),
}
