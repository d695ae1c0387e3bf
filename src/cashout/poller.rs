//! Periodic cash-out valuation
//!
//! One task values every open bet on a fixed interval and publishes the
//! latest valuations through a watch channel. Cycles run sequentially; a
//! tick that fires while a cycle is still running is skipped.

use super::{CashOutDesk, CashOutQuote};
use crate::bet::BetId;
use crate::cache::Clock;
use crate::config::CashOutConfig;
use crate::ledger::CashOutKind;
use crate::telemetry::{record_latency, set_gauge, GaugeMetric, LatencyMetric};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Latest valuations keyed by bet
pub type Valuations = HashMap<BetId, CashOutQuote>;

/// Handle to a running poller; dropping it stops polling
pub struct CashOutPoller {
    shutdown: Option<oneshot::Sender<()>>,
    valuations: watch::Receiver<Arc<Valuations>>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl CashOutPoller {
    /// Start polling every `cashout.poll_interval_secs`
    pub fn from_config(
        desk: Arc<CashOutDesk>,
        clock: Arc<dyn Clock>,
        config: &CashOutConfig,
        city: Option<String>,
    ) -> Self {
        Self::spawn(desk, clock, Duration::from_secs(config.poll_interval_secs), city)
    }

    /// Start polling; `city` limits the open bets valued
    pub fn spawn(
        desk: Arc<CashOutDesk>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        city: Option<String>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (tx, rx) = watch::channel(Arc::new(Valuations::new()));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(interval_ms = interval.as_millis() as u64, "Cash-out poller started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let valuations = poll_once(&desk, clock.as_ref(), city.as_deref()).await;
                        if tx.send(Arc::new(valuations)).is_err() {
                            // Every receiver is gone
                            break;
                        }
                    }
                }
            }

            tracing::info!("Cash-out poller stopped");
        });

        Self {
            shutdown: Some(shutdown_tx),
            valuations: rx,
            interval,
            task: Some(task),
        }
    }

    /// Receiver of the latest valuations
    pub fn subscribe(&self) -> watch::Receiver<Arc<Valuations>> {
        self.valuations.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn latest(&self) -> Arc<Valuations> {
        self.valuations.borrow().clone()
    }

    /// Stop polling and wait for the current cycle to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CashOutPoller {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Value every open bet once; bets no longer offered are left out
pub async fn poll_once(desk: &CashOutDesk, clock: &dyn Clock, city: Option<&str>) -> Valuations {
    let start = Instant::now();
    let now = clock.now();
    let open = desk.book().pending(city).await;

    let mut valuations = Valuations::new();
    for bet in &open {
        match desk.quote_bet(bet, CashOutKind::Full, now).await {
            Ok(quote) => {
                valuations.insert(bet.id, quote);
            }
            Err(e) => tracing::debug!(bet_id = %bet.id, error = %e, "Cash-out not offered"),
        }
    }

    set_gauge(GaugeMetric::OpenBetsPolled, open.len() as f64);
    record_latency(LatencyMetric::CashOutPoll, start.elapsed());
    tracing::debug!(open = open.len(), offered = valuations.len(), "Cash-out poll complete");

    valuations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::cashout::desk::tests::{desk, open_bet};
    use crate::ledger::{BetBook, InMemoryBook, Settlement};
    use chrono::{Duration as ChronoDuration, Utc};

    #[tokio::test]
    async fn test_poll_once_skips_closing_bets() {
        let book = InMemoryBook::new();
        let now = Utc::now();
        let offered = open_bet(&book, now).await;
        let settled = open_bet(&book, now).await;
        book.settle(settled.id, Settlement::loss(now)).await.unwrap();

        let desk = desk(book.clone(), 60.0);
        let clock = ManualClock::new(now);

        let valuations = poll_once(&desk, &clock, None).await;
        assert_eq!(valuations.len(), 1);
        assert!(valuations.contains_key(&offered.id));

        // Inside the closing window nothing is offered
        clock.advance(ChronoDuration::hours(10) - ChronoDuration::minutes(10));
        assert!(poll_once(&desk, &clock, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_poller_publishes_and_stops() {
        let book = InMemoryBook::new();
        let now = Utc::now();
        let bet = open_bet(&book, now).await;

        let desk = Arc::new(desk(book, 60.0));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));
        let poller = CashOutPoller::spawn(desk, clock, Duration::from_millis(20), Some("Paris".to_string()));

        let mut rx = poller.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(rx.borrow().contains_key(&bet.id));
        assert!(poller.latest().contains_key(&bet.id));

        tokio::time::timeout(Duration::from_secs(2), poller.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_drop_stops_poller() {
        let book = InMemoryBook::new();
        let desk = Arc::new(desk(book, 60.0));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let poller = CashOutPoller::spawn(desk, clock, Duration::from_millis(10), None);

        let mut rx = poller.subscribe();
        drop(poller);

        // Sender side closes once the task exits
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
