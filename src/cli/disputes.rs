//! Disputes command implementation

use super::open_verification_log;
use crate::config::Config;
use crate::settlement::{resolve_all_disputed, BulkStrategy, OverrideRequest};
use crate::weather::ReadingValue;
use anyhow::Context;
use chrono::Utc;
use clap::{Args, Subcommand};
use uuid::Uuid;

#[derive(Args, Debug)]
pub struct DisputesArgs {
    #[command(subcommand)]
    pub action: DisputesAction,
}

#[derive(Subcommand, Debug)]
pub enum DisputesAction {
    /// List disputed verifications
    List,
    /// Resolve every disputed verification with one strategy
    Resolve {
        /// use_primary, use_secondary or use_average
        #[arg(long)]
        strategy: BulkStrategy,
        /// Who is resolving
        #[arg(long, default_value = "cli")]
        source: String,
    },
    /// Override one disputed verification
    Override {
        #[arg(long)]
        entry: Uuid,
        /// Numeric value or yes/no
        #[arg(long)]
        value: String,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "cli")]
        source: String,
    },
}

impl DisputesArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if config.settlement.audit_log.is_none() {
            anyhow::bail!("settlement.audit_log must be set to manage disputes");
        }
        let log = open_verification_log(config).await?;

        match &self.action {
            DisputesAction::List => {
                let disputed = log.disputed().await;
                println!("{}", serde_json::to_string_pretty(&disputed)?);
            }
            DisputesAction::Resolve { strategy, source } => {
                let resolved = resolve_all_disputed(log.as_ref(), *strategy, source, Utc::now()).await?;
                println!("Resolved {} disputed verifications", resolved.len());
            }
            DisputesAction::Override {
                entry,
                value,
                reason,
                source,
            } => {
                let value = parse_reading(value)?;
                let request = OverrideRequest::manual(value, reason.clone(), source.clone(), Utc::now());
                let updated = log.apply_override(*entry, request).await?;
                println!("{}", serde_json::to_string_pretty(&updated)?);
            }
        }

        Ok(())
    }
}

fn parse_reading(value: &str) -> anyhow::Result<ReadingValue> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("Invalid value '{value}', expected a number or yes/no"))
}
