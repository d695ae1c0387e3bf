use clap::Parser;
use weather_odds::cli::{Cli, Commands};
use weather_odds::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = weather_odds::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Quote(args) => args.execute(&config).await?,
        Commands::Verify(args) => {
            tracing::info!(city = %args.city, "Starting verification");
            args.execute(&config).await?;
        }
        Commands::Disputes(args) => args.execute(&config).await?,
        Commands::Streak(args) => args.execute(&config).await?,
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Weather: primary={} secondary={} (key {})",
                config.weather.primary_url,
                config.weather.secondary_url,
                if config.weather.secondary_api_key.is_empty() { "missing" } else { "set" }
            );
            println!(
                "  Odds: edge={}% range=[{}, {}] default={}",
                config.odds.house_edge_pct,
                config.odds.min_odds,
                config.odds.max_odds,
                config.odds.default_odds
            );
            println!(
                "  Volatility: baseline={}% max_bonus={} min_samples={}",
                config.volatility.baseline_accuracy,
                config.volatility.max_bonus,
                config.volatility.min_samples
            );
            println!(
                "  Cash-out: base={}% penalty full={}% partial={}% closes {}m before expiry",
                config.cashout.base_pct,
                config.cashout.full_penalty_pct,
                config.cashout.partial_penalty_pct,
                config.cashout.min_minutes_before_expiry
            );
            println!(
                "  Audit log: {}",
                config
                    .settlement
                    .audit_log
                    .as_ref()
                    .map_or("in-memory".to_string(), |p| p.display().to_string())
            );
            println!("  Cities: {}", config.cities.len());
        }
    }

    Ok(())
}
