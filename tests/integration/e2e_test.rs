//! End-to-end integration tests

use rust_decimal_macros::dec;
use std::io::Write;
use volspike::config::{Classifier, Config, ExecutionMode, LogFormat};

#[test]
fn test_config_example_matches_defaults() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    config.validate().unwrap();

    let defaults = Config::default();
    assert_eq!(config.feed.instruments, defaults.feed.instruments);
    assert_eq!(config.feed.interval, "15m");
    assert_eq!(config.signal.window, defaults.signal.window);
    assert_eq!(config.signal.zscore_threshold, 2.0);
    assert_eq!(config.signal.classifier, Classifier::Candle);
    assert_eq!(config.signal.taker_buy_ratio, defaults.signal.taker_buy_ratio);
    assert_eq!(config.risk.risk_fraction, dec!(0.98));
    assert_eq!(config.risk.leverage, 11);
    assert_eq!(config.risk.stop_loss_pct, dec!(0.0341));
    assert_eq!(config.risk.take_profit_pct, dec!(0.035));
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.execution.initial_balance, dec!(1000));
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_partial_config_fills_defaults() {
    let toml = r#"
        [feed]
        instruments = ["SUIUSDT", "ETHUSDT"]
        interval = "5m"

        [risk]
        leverage = 5

        [telemetry]
        log_format = "json"
        metrics_port = 9090
    "#;

    let config: Config = toml::from_str(toml).unwrap();
    config.validate().unwrap();
    assert_eq!(config.feed.instruments.len(), 2);
    assert_eq!(
        config.feed.interval_duration().unwrap(),
        std::time::Duration::from_secs(300)
    );
    assert_eq!(config.risk.leverage, 5);
    assert_eq!(config.risk.risk_fraction, dec!(0.98));
    assert_eq!(config.telemetry.log_format, LogFormat::Json);
    assert_eq!(config.telemetry.metrics_port, Some(9090));
}

#[test]
fn test_invalid_config_rejected() {
    let config: Config = toml::from_str("[risk]\nstop_loss_pct = 1.5").unwrap();
    assert!(config.validate().is_err());

    let config: Config = toml::from_str("[feed]\ninterval = \"15x\"").unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_config_file_is_not_replaced_by_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[signal]\nwindow = 2").unwrap();

    let err = Config::load_or_default(file.path()).unwrap_err();
    assert!(err.to_string().contains("signal.window"));
}
