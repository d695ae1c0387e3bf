//! Cash-out desk
//!
//! Prices open bets from live weather and commits full or partial cash-outs
//! through the bet book. A quote carries the stake it was computed against;
//! the book refuses it if the bet has moved on since.

use super::{
    current_favorability, forecast_favorability, CashOutCalculation, CashOutError,
    CashOutValuationModel,
};
use crate::bet::{Bet, BetId};
use crate::ledger::{BetBook, BookError, CashOutKind, CashOutRequest};
use crate::odds::BucketTable;
use crate::telemetry::{incr_counter, CounterMetric};
use crate::weather::{forecast_for_date, City, ForecastCache, WeatherProvider};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A valuation tied to the bet state it was computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashOutQuote {
    pub bet_id: BetId,
    #[serde(skip)]
    pub kind: CashOutKind,
    /// Stake at valuation time
    pub stake: Decimal,
    pub calculation: CashOutCalculation,
    /// Favorability the valuation used
    pub favorability: f64,
    pub valued_at: DateTime<Utc>,
}

/// Prices and executes cash-outs
pub struct CashOutDesk {
    model: CashOutValuationModel,
    book: Arc<dyn BetBook>,
    forecasts: Arc<ForecastCache>,
    current: Arc<dyn WeatherProvider>,
    cities: HashMap<String, City>,
    table: BucketTable,
}

impl CashOutDesk {
    pub fn new(
        model: CashOutValuationModel,
        book: Arc<dyn BetBook>,
        forecasts: Arc<ForecastCache>,
        current: Arc<dyn WeatherProvider>,
        cities: Vec<City>,
    ) -> Self {
        Self {
            model,
            book,
            forecasts,
            current,
            cities: cities
                .into_iter()
                .map(|c| (c.name.to_lowercase(), c))
                .collect(),
            table: BucketTable,
        }
    }

    pub fn model(&self) -> &CashOutValuationModel {
        &self.model
    }

    pub fn book(&self) -> &Arc<dyn BetBook> {
        &self.book
    }

    /// Favorability of a bet from the target-day forecast, falling back to
    /// current conditions; 0 when no live data covers it
    pub async fn favorability(&self, bet: &Bet, now: DateTime<Utc>) -> f64 {
        let Some(city) = self.cities.get(&bet.city.to_lowercase()) else {
            debug!(bet_id = %bet.id, city = %bet.city, "City not configured, no weather bonus");
            return 0.0;
        };

        let days_ahead = bet.days_ahead(now.date_naive());
        match self.forecasts.forecast(city, days_ahead + 1).await {
            Ok(series) => {
                let from_forecast = forecast_for_date(&series, bet.target_date).and_then(|day| {
                    forecast_favorability(bet.category, &bet.prediction, day, &self.table)
                });
                if let Some(f) = from_forecast {
                    return f;
                }
            }
            Err(e) => debug!(city = %city.name, error = %e, "Forecast unavailable for cash-out"),
        }

        match self.current.current(city).await {
            Ok(snapshot) => {
                current_favorability(bet.category, &bet.prediction, &snapshot, &self.table)
                    .unwrap_or(0.0)
            }
            Err(e) => {
                debug!(city = %city.name, error = %e, "Current weather unavailable for cash-out");
                0.0
            }
        }
    }

    /// Value a bet that is already loaded
    pub async fn quote_bet(
        &self,
        bet: &Bet,
        kind: CashOutKind,
        now: DateTime<Utc>,
    ) -> Result<CashOutQuote, CashOutError> {
        self.model.ensure_available(bet, now)?;
        let favorability = self.favorability(bet, now).await;
        let calculation = self.model.value(bet, favorability, kind, now)?;

        Ok(CashOutQuote {
            bet_id: bet.id,
            kind,
            stake: bet.stake,
            calculation,
            favorability,
            valued_at: now,
        })
    }

    pub async fn quote(
        &self,
        bet_id: BetId,
        kind: CashOutKind,
        now: DateTime<Utc>,
    ) -> Result<CashOutQuote, CashOutError> {
        let bet = self
            .book
            .bet(bet_id)
            .await
            .ok_or(CashOutError::Book(BookError::UnknownBet(bet_id)))?;
        self.quote_bet(&bet, kind, now).await
    }

    /// Commit a quote the user accepted
    pub async fn confirm(&self, quote: &CashOutQuote, now: DateTime<Utc>) -> Result<Bet, CashOutError> {
        let bet = self
            .book
            .bet(quote.bet_id)
            .await
            .ok_or(CashOutError::Book(BookError::UnknownBet(quote.bet_id)))?;
        self.model.ensure_available(&bet, now)?;

        let request = CashOutRequest {
            kind: quote.kind,
            expected_stake: quote.stake,
            credit: quote.calculation.amount,
            at: now,
        };
        let updated = self.book.cash_out(quote.bet_id, request).await?;

        let metric = match quote.kind {
            CashOutKind::Full => CounterMetric::FullCashOuts,
            CashOutKind::Partial { .. } => CounterMetric::PartialCashOuts,
        };
        incr_counter(metric, 1);
        info!(
            bet_id = %quote.bet_id,
            kind = ?quote.kind,
            amount = %quote.calculation.amount,
            percentage = %quote.calculation.percentage,
            remaining_stake = %updated.stake,
            "Cash-out executed"
        );

        Ok(updated)
    }

    /// Close a bet at its current value
    pub async fn cash_out(&self, bet_id: BetId, now: DateTime<Utc>) -> Result<Bet, CashOutError> {
        let quote = self.quote(bet_id, CashOutKind::Full, now).await?;
        self.confirm(&quote, now).await
    }

    /// Close a fraction of a bet's stake, keeping the rest open
    pub async fn partial_cash_out(
        &self,
        bet_id: BetId,
        fraction: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Bet, CashOutError> {
        let quote = self
            .quote(bet_id, CashOutKind::Partial { fraction }, now)
            .await?;
        self.confirm(&quote, now).await
    }
}
