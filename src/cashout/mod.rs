//! Cash-out module
//!
//! Live exit valuation for open bets, the desk that executes full and
//! partial cash-outs, and the periodic poller.

mod desk;
mod poller;
mod valuation;

pub use desk::{CashOutDesk, CashOutQuote};
pub use poller::{poll_once, CashOutPoller, Valuations};
pub use valuation::{
    current_favorability, favorability_scale, forecast_favorability, percentage_f64,
    CashOutCalculation, CashOutValuationModel,
};

use crate::bet::{BetId, BetResult};
use crate::ledger::BookError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Cash-out errors
#[derive(Debug, Error, PartialEq)]
pub enum CashOutError {
    #[error("Bet {id} is no longer pending ({result:?})")]
    NotPending { id: BetId, result: BetResult },
    #[error("Bet {id} closes in {minutes_left} minutes, cash-out requires {required}")]
    ClosingWindow {
        id: BetId,
        minutes_left: i64,
        required: i64,
    },
    #[error("Bet {id} changed since valuation (stake {expected} is now {actual})")]
    StaleValuation {
        id: BetId,
        expected: Decimal,
        actual: Decimal,
    },
    #[error("Bet {0} is a parlay leg and cannot be cashed out alone")]
    ParlayLeg(BetId),
    #[error("Cash-out fraction {0} must leave a positive stake")]
    InvalidFraction(Decimal),
    #[error("Bet book error: {0}")]
    Book(BookError),
}

impl From<BookError> for CashOutError {
    fn from(e: BookError) -> Self {
        match e {
            BookError::NotPending { id, result } => CashOutError::NotPending { id, result },
            BookError::StaleValuation {
                id,
                expected,
                actual,
            } => CashOutError::StaleValuation {
                id,
                expected,
                actual,
            },
            BookError::InvalidFraction(f) => CashOutError::InvalidFraction(f),
            BookError::ParlayLeg(id) => CashOutError::ParlayLeg(id),
            other => CashOutError::Book(other),
        }
    }
}
