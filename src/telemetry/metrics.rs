//! Prometheus metrics

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Completed verification calls
    Verifications,
    /// Categories found in dispute
    Disputes,
    /// Verifications run without the secondary source
    DegradedVerifications,
    /// Bets graded as won
    BetsWon,
    /// Bets graded as lost
    BetsLost,
    /// Settle attempts on bets that were no longer pending
    DuplicateSettlements,
    /// Full cash-outs
    FullCashOuts,
    /// Partial cash-outs
    PartialCashOuts,
    /// Administrative overrides of disputed values
    Overrides,
}

/// Latency metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMetric {
    /// Primary weather provider fetch
    PrimaryFetch,
    /// Secondary weather provider fetch
    SecondaryFetch,
    /// One cash-out valuation poll cycle
    CashOutPoll,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Open bets valued in the last poll cycle
    OpenBetsPolled,
    /// Average confidence of the last verification
    VerificationConfidence,
}

impl CounterMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::Verifications => "weather_odds_verifications_total",
            CounterMetric::Disputes => "weather_odds_disputes_total",
            CounterMetric::DegradedVerifications => "weather_odds_degraded_verifications_total",
            CounterMetric::BetsWon => "weather_odds_bets_won_total",
            CounterMetric::BetsLost => "weather_odds_bets_lost_total",
            CounterMetric::DuplicateSettlements => "weather_odds_duplicate_settlements_total",
            CounterMetric::FullCashOuts => "weather_odds_full_cashouts_total",
            CounterMetric::PartialCashOuts => "weather_odds_partial_cashouts_total",
            CounterMetric::Overrides => "weather_odds_overrides_total",
        }
    }
}

impl LatencyMetric {
    pub fn name(&self) -> &'static str {
        match self {
            LatencyMetric::PrimaryFetch => "weather_odds_primary_fetch_latency_ms",
            LatencyMetric::SecondaryFetch => "weather_odds_secondary_fetch_latency_ms",
            LatencyMetric::CashOutPoll => "weather_odds_cashout_poll_latency_ms",
        }
    }
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::OpenBetsPolled => "weather_odds_open_bets_polled",
            GaugeMetric::VerificationConfidence => "weather_odds_verification_confidence",
        }
    }
}

/// Increment a counter
pub fn incr_counter(metric: CounterMetric, by: u64) {
    ::metrics::counter!(metric.name()).increment(by);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    tracing::debug!(
        metric = metric.name(),
        value_ms = duration.as_millis(),
        "Recording latency"
    );
    ::metrics::histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    ::metrics::gauge!(metric.name()).set(value);
}

/// Install the Prometheus exporter with an HTTP listener on all interfaces
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}
