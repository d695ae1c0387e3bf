//! Verify command implementation

use super::{find_city, open_verification_log, primary_provider, secondary_provider};
use crate::bet::Category;
use crate::config::Config;
use crate::settlement::{SettlementEngine, VerificationLogEntry};
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// City name as configured
    #[arg(long)]
    pub city: String,

    /// Categories to verify, comma separated; all when omitted
    #[arg(long, value_delimiter = ',')]
    pub categories: Vec<Category>,
}

impl VerifyArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let city = find_city(config, &self.city)?;
        let engine = SettlementEngine::new(
            primary_provider(config),
            secondary_provider(config),
            config.settlement.thresholds.clone(),
            Duration::from_secs(config.settlement.fetch_timeout_secs),
        );

        let report = engine.verify(&city, &self.categories).await?;

        let log = open_verification_log(config).await?;
        log.append(VerificationLogEntry::from_report(&report)).await?;

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
