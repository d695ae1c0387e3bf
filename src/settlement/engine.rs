//! Dual-source verification
//!
//! Both providers are fetched concurrently. A primary failure aborts the
//! verification; a secondary failure degrades to comparing the primary
//! reading against itself and is surfaced in the summary.

use super::{verify_category, SettlementError, VerificationReport, VerificationSummary};
use crate::bet::Category;
use crate::config::DisputeThresholds;
use crate::telemetry::{incr_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric};
use crate::weather::{City, WeatherError, WeatherProvider, WeatherSnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Reconciles two weather providers into one authoritative reading per category
pub struct SettlementEngine {
    primary: Arc<dyn WeatherProvider>,
    secondary: Arc<dyn WeatherProvider>,
    thresholds: DisputeThresholds,
    fetch_timeout: Duration,
}

impl SettlementEngine {
    pub fn new(
        primary: Arc<dyn WeatherProvider>,
        secondary: Arc<dyn WeatherProvider>,
        thresholds: DisputeThresholds,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            thresholds,
            fetch_timeout,
        }
    }

    pub fn thresholds(&self) -> &DisputeThresholds {
        &self.thresholds
    }

    /// Verify the given categories for a city; an empty list means all of them
    pub async fn verify(
        &self,
        city: &City,
        categories: &[Category],
    ) -> Result<VerificationReport, SettlementError> {
        let categories: Vec<Category> = if categories.is_empty() {
            Category::ALL.to_vec()
        } else {
            categories.to_vec()
        };

        let (primary, secondary) = tokio::join!(
            self.fetch(self.primary.as_ref(), city, LatencyMetric::PrimaryFetch),
            self.fetch(self.secondary.as_ref(), city, LatencyMetric::SecondaryFetch),
        );

        let primary = primary.map_err(|e| {
            warn!(city = %city.name, error = %e, "Primary weather source failed");
            SettlementError::PrimaryUnavailable(e)
        })?;

        let secondary = match secondary {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(city = %city.name, error = %e, "Secondary weather source failed, verifying with primary only");
                incr_counter(CounterMetric::DegradedVerifications, 1);
                None
            }
        };

        let report = reconcile(
            &city.name,
            &primary,
            secondary.as_ref(),
            &categories,
            &self.thresholds,
            Utc::now(),
        );

        incr_counter(CounterMetric::Verifications, 1);
        incr_counter(CounterMetric::Disputes, report.summary.disputed_count as u64);
        set_gauge(GaugeMetric::VerificationConfidence, report.summary.average_confidence);

        if report.summary.disputed_count > 0 {
            warn!(
                city = %city.name,
                disputed = ?report.summary.disputed_categories,
                "Weather sources disagree"
            );
        }
        info!(
            city = %city.name,
            categories = report.results.len(),
            disputed = report.summary.disputed_count,
            confidence = report.summary.average_confidence,
            all_sources = report.summary.all_sources_available,
            "Verification complete"
        );

        Ok(report)
    }

    async fn fetch(
        &self,
        provider: &dyn WeatherProvider,
        city: &City,
        metric: LatencyMetric,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.fetch_timeout, provider.current(city)).await {
            Ok(result) => result,
            Err(_) => Err(WeatherError::Timeout),
        };
        record_latency(metric, start.elapsed());
        debug!(city = %city.name, source = ?provider.source(), ok = result.is_ok(), "Fetched current weather");
        result
    }
}

/// Build a report from fetched snapshots; without a secondary snapshot the
/// primary reading stands in for both legs
pub fn reconcile(
    city: &str,
    primary: &WeatherSnapshot,
    secondary: Option<&WeatherSnapshot>,
    categories: &[Category],
    thresholds: &DisputeThresholds,
    verified_at: DateTime<Utc>,
) -> VerificationReport {
    let other = secondary.unwrap_or(primary);

    let results: Vec<_> = categories
        .iter()
        .map(|&category| {
            verify_category(
                category,
                primary.value(category),
                other.value(category),
                thresholds.get(category),
            )
        })
        .collect();

    let disputed_categories: Vec<Category> = results
        .iter()
        .filter(|r| r.is_disputed)
        .map(|r| r.category)
        .collect();

    let average_confidence = if results.is_empty() {
        100.0
    } else {
        results.iter().map(|r| r.confidence_score).sum::<f64>() / results.len() as f64
    };

    VerificationReport {
        city: city.to_string(),
        verified_at,
        summary: VerificationSummary {
            disputed_count: disputed_categories.len(),
            disputed_categories,
            average_confidence,
            all_sources_available: secondary.is_some(),
        },
        results,
        primary_raw: primary.raw.clone(),
        secondary_raw: secondary.map(|s| s.raw.clone()),
    }
}
