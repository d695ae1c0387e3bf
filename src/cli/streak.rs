//! Streak command implementation

use crate::bonus::StreakBonus;
use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct StreakArgs {
    /// Consecutive wins
    pub streak: u32,
}

impl StreakArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let bonus = StreakBonus::new(&config.streak);
        println!("Streak {}: x{}", self.streak, bonus.multiplier(self.streak));
        Ok(())
    }
}
