//! Integration tests for weather-odds

mod cashout_test;
mod config_test;
mod settlement_test;
mod support;
