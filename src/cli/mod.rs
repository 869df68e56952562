//! CLI interface for volspike
//!
//! Provides subcommands for:
//! - `run`: Start the trading loop against the paper exchange
//! - `precision`: Look up an instrument's price/quantity precision
//! - `config`: Show the effective configuration

mod precision;
mod run;

pub use precision::PrecisionArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "volspike")]
#[command(about = "Volume-spike futures trading bot with bracketed entries")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trading loop
    Run(RunArgs),
    /// Show an instrument's precision and mark price
    Precision(PrecisionArgs),
    /// Show configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_once() {
        let cli = Cli::try_parse_from(["volspike", "run", "--once"]).unwrap();
        assert_eq!(cli.config, "config.toml");
        assert!(matches!(cli.command, Commands::Run(RunArgs { once: true })));
    }

    #[test]
    fn test_parse_precision() {
        let cli =
            Cli::try_parse_from(["volspike", "--config", "prod.toml", "precision", "SUIUSDT"])
                .unwrap();
        assert_eq!(cli.config, "prod.toml");
        let Commands::Precision(args) = cli.command else {
            panic!("expected precision command");
        };
        assert_eq!(args.instrument, "SUIUSDT");
    }

    #[test]
    fn test_precision_requires_symbol() {
        assert!(Cli::try_parse_from(["volspike", "precision"]).is_err());
    }
}
