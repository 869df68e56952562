//! Configuration types for volspike

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Market data configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// REST base URL for public market data
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Instruments to trade (exchange symbols)
    #[serde(default = "default_instruments")]
    pub instruments: Vec<String>,
    /// Bar interval in exchange notation ("1m", "15m", "1h", ...)
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_base_url() -> String {
    "https://fapi.binance.com".to_string()
}
fn default_instruments() -> Vec<String> {
    vec!["SUIUSDT".to_string()]
}
fn default_interval() -> String {
    "15m".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            instruments: default_instruments(),
            interval: default_interval(),
        }
    }
}

impl FeedConfig {
    /// Bar interval as a duration
    pub fn interval_duration(&self) -> anyhow::Result<Duration> {
        parse_interval(&self.interval)
    }
}

/// Volume spike detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Number of bars in the rolling window, including the bar under test
    #[serde(default = "default_window")]
    pub window: usize,
    /// Z-score at or above which a bar counts as a spike
    #[serde(default = "default_zscore_threshold")]
    pub zscore_threshold: f64,
    /// Raw volume a spike must exceed
    #[serde(default)]
    pub min_volume: Decimal,
    /// How a spike bar's direction is decided
    #[serde(default)]
    pub classifier: Classifier,
    /// Taker-buy share above which a spike is a buy (`taker_ratio` only)
    #[serde(default = "default_taker_buy_ratio")]
    pub taker_buy_ratio: Decimal,
    /// Taker-buy share below which a spike is a sell (`taker_ratio` only)
    #[serde(default = "default_taker_sell_ratio")]
    pub taker_sell_ratio: Decimal,
}

/// Direction rule for spike bars
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    /// Green bar buys, red bar sells
    #[default]
    Candle,
    /// Taker-buy share of the bar's volume decides, mixed flow is skipped
    TakerRatio,
}

fn default_window() -> usize {
    20
}
fn default_zscore_threshold() -> f64 {
    2.0
}
fn default_taker_buy_ratio() -> Decimal {
    Decimal::new(6, 1) // 0.6
}
fn default_taker_sell_ratio() -> Decimal {
    Decimal::new(4, 1) // 0.4
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            zscore_threshold: default_zscore_threshold(),
            min_volume: Decimal::ZERO,
            classifier: Classifier::Candle,
            taker_buy_ratio: default_taker_buy_ratio(),
            taker_sell_ratio: default_taker_sell_ratio(),
        }
    }
}

/// Position sizing and bracket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Fraction of wallet balance committed as margin per entry
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: Decimal,
    /// Leverage applied on top of committed margin
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Stop-loss distance from entry as a fraction (0.0341 = 3.41%)
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Take-profit distance from entry as a fraction
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
}

fn default_risk_fraction() -> Decimal {
    Decimal::new(98, 2) // 0.98
}
fn default_leverage() -> u32 {
    11
}
fn default_stop_loss_pct() -> Decimal {
    Decimal::new(341, 4) // 0.0341 = 3.41%
}
fn default_take_profit_pct() -> Decimal {
    Decimal::new(35, 3) // 0.035 = 3.5%
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_fraction: default_risk_fraction(),
            leverage: default_leverage(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
        }
    }
}

/// Order submission retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per logical order, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_multiplier() -> u32 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    /// Starting wallet balance for the paper exchange (quote asset)
    pub initial_balance: Decimal,
    /// Bound on every exchange and market data call (seconds)
    pub request_timeout_secs: u64,
}

/// Execution mode
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated fills against live mark prices
    #[default]
    Paper,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            initial_balance: Decimal::from(1000),
            request_timeout_secs: 10,
        }
    }
}

impl ExecutionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Tick scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Wait after each bar boundary so the exchange has published the bar
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
}

fn default_settle_delay_secs() -> u64 {
    2
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay_secs(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults when no such file exists
    ///
    /// A file that exists but fails to parse or validate is an error.
    pub fn load_or_default(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))
    }

    /// Reject settings the trading loop cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feed.instruments.is_empty() {
            anyhow::bail!("feed.instruments must name at least one instrument");
        }
        self.feed.interval_duration()?;
        if self.signal.window < 3 {
            anyhow::bail!("signal.window must be at least 3, got {}", self.signal.window);
        }
        if !(self.signal.zscore_threshold.is_finite() && self.signal.zscore_threshold > 0.0) {
            anyhow::bail!("signal.zscore_threshold must be positive");
        }
        let (sell, buy) = (self.signal.taker_sell_ratio, self.signal.taker_buy_ratio);
        if !(Decimal::ZERO < sell && sell < buy && buy < Decimal::ONE) {
            anyhow::bail!(
                "signal taker ratios must satisfy 0 < sell < buy < 1, got {} and {}",
                sell,
                buy
            );
        }
        for (name, value) in [
            ("risk.risk_fraction", self.risk.risk_fraction),
            ("risk.stop_loss_pct", self.risk.stop_loss_pct),
            ("risk.take_profit_pct", self.risk.take_profit_pct),
        ] {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
            }
        }
        if self.risk.leverage == 0 {
            anyhow::bail!("risk.leverage must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

/// Parse exchange interval notation ("30s", "15m", "4h", "1d")
pub fn parse_interval(interval: &str) -> anyhow::Result<Duration> {
    let interval = interval.trim();
    let split = interval
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow::anyhow!("Interval '{}' has no unit", interval))?;
    let (count, unit) = interval.split_at(split);
    let count: u64 = count
        .parse()
        .map_err(|_| anyhow::anyhow!("Interval '{}' has no count", interval))?;
    if count == 0 {
        anyhow::bail!("Interval '{}' must be non-zero", interval);
    }

    let unit_secs = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => anyhow::bail!("Unknown interval unit '{}'", unit),
    };
    let secs = count
        .checked_mul(unit_secs)
        .ok_or_else(|| anyhow::anyhow!("Interval '{}' is too long", interval))?;
    Ok(Duration::from_secs(secs))
}
