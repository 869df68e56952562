use clap::Parser;
use volspike::cli::{Cli, Commands};
use volspike::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !std::path::Path::new(&cli.config).exists() {
        eprintln!("Warning: {} not found, using default configuration", cli.config);
    }
    let config = Config::load_or_default(&cli.config)?;

    volspike::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            args.execute(&config).await?;
        }
        Commands::Precision(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Feed: {} {:?} every {}",
                config.feed.base_url, config.feed.instruments, config.feed.interval
            );
            println!(
                "  Signal: window={}, z>={}, min_volume={}, classifier={:?}",
                config.signal.window,
                config.signal.zscore_threshold,
                config.signal.min_volume,
                config.signal.classifier
            );
            println!(
                "  Risk: fraction={}, leverage={}x, SL={}%, TP={}%",
                config.risk.risk_fraction,
                config.risk.leverage,
                config.risk.stop_loss_pct * rust_decimal_macros::dec!(100),
                config.risk.take_profit_pct * rust_decimal_macros::dec!(100)
            );
            println!(
                "  Retry: attempts={}, backoff={}ms..{}ms",
                config.retry.max_attempts,
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms
            );
            println!(
                "  Execution: {:?}, balance={}, timeout={}s",
                config.execution.mode,
                config.execution.initial_balance,
                config.execution.request_timeout_secs
            );
        }
    }

    Ok(())
}
