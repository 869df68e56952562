//! Binance USDⓈ-M futures public REST client
//!
//! Klines, exchange info, and mark price. None of these endpoints are
//! signed, so no credentials are involved.

use super::{CandleFeed, MarketData};
use crate::candle::Candle;
use crate::exchange::Precision;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Binance USDⓈ-M futures REST base URL
pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

/// Configuration for the Binance futures client
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// REST base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_FUTURES_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Raw kline row:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBuyBase, takerBuyQuote, ignore]`
#[derive(Debug, Deserialize)]
struct RawKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    serde_json::Value,
    serde_json::Value,
    serde_json::Value,
    serde_json::Value,
    serde_json::Value,
);

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    price_precision: u32,
    quantity_precision: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    mark_price: String,
}

/// Client for Binance's public futures endpoints
pub struct BinanceFuturesClient {
    config: BinanceConfig,
    client: Client,
}

impl BinanceFuturesClient {
    /// Create a client with custom configuration
    pub fn with_config(config: BinanceConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!(url = %url, "Binance REST request");

        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error: {} - {}", status, body);
        }

        Ok(response.json().await?)
    }

    /// Look up an instrument's precision in exchange info
    pub async fn fetch_precision(&self, instrument: &str) -> anyhow::Result<Precision> {
        let info: ExchangeInfo = self.get_json("/fapi/v1/exchangeInfo", &[]).await?;
        find_precision(&info, instrument)
    }
}

#[async_trait]
impl CandleFeed for BinanceFuturesClient {
    async fn closed_candles(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Candle>> {
        // One extra row: the newest kline is usually still open
        let rows: Vec<RawKline> = self
            .get_json(
                "/fapi/v1/klines",
                &[
                    ("symbol", instrument.to_uppercase()),
                    ("interval", interval.to_string()),
                    ("limit", (limit + 1).to_string()),
                ],
            )
            .await?;

        let mut candles = closed_klines(rows, Utc::now())?;
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }

        tracing::debug!(
            instrument,
            count = candles.len(),
            "Fetched closed klines"
        );
        Ok(candles)
    }
}

#[async_trait]
impl MarketData for BinanceFuturesClient {
    async fn mark_price(&self, instrument: &str) -> anyhow::Result<Decimal> {
        let index: PremiumIndex = self
            .get_json(
                "/fapi/v1/premiumIndex",
                &[("symbol", instrument.to_uppercase())],
            )
            .await?;
        Ok(Decimal::from_str(&index.mark_price)?)
    }

    async fn precision(&self, instrument: &str) -> anyhow::Result<Precision> {
        self.fetch_precision(instrument).await
    }
}

/// Convert raw rows to candles, dropping any bar not yet closed at `now`
fn closed_klines(rows: Vec<RawKline>, now: DateTime<Utc>) -> anyhow::Result<Vec<Candle>> {
    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let close_time = millis_to_utc(row.6)?;
        if close_time >= now {
            continue;
        }
        candles.push(Candle {
            open_time: millis_to_utc(row.0)?,
            close_time,
            open: Decimal::from_str(&row.1)?,
            high: Decimal::from_str(&row.2)?,
            low: Decimal::from_str(&row.3)?,
            close: Decimal::from_str(&row.4)?,
            volume: Decimal::from_str(&row.5)?,
            taker_buy_volume: row.9.as_str().map(Decimal::from_str).transpose()?,
        });
    }
    Ok(candles)
}

fn millis_to_utc(millis: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp: {}", millis))
}

fn find_precision(info: &ExchangeInfo, instrument: &str) -> anyhow::Result<Precision> {
    info.symbols
        .iter()
        .find(|s| s.symbol.eq_ignore_ascii_case(instrument))
        .map(|s| Precision::new(s.price_precision, s.quantity_precision))
        .ok_or_else(|| anyhow::anyhow!("Unknown instrument: {}", instrument))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const KLINES: &str = r#"[
        [1700000000000, "1.5000", "1.5200", "1.4900", "1.5100", "120345.2", 1700000899999, "181000.1", 812, "60000.0", "90000.0", "0"],
        [1700000900000, "1.5100", "1.5400", "1.5000", "1.5300", "98000.0", 1700001799999, "150000.0", 640, "50000.0", "76000.0", "0"]
    ]"#;

    #[test]
    fn test_client_creation() {
        let client = BinanceFuturesClient::with_config(BinanceConfig::default()).unwrap();
        assert_eq!(client.config.base_url, BINANCE_FUTURES_URL);
    }

    #[test]
    fn test_parse_klines() {
        let rows: Vec<RawKline> = serde_json::from_str(KLINES).unwrap();
        let now = Utc.timestamp_millis_opt(1_700_002_000_000).unwrap();
        let candles = closed_klines(rows, now).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, dec!(1.5000));
        assert_eq!(candles[0].volume, dec!(120345.2));
        assert_eq!(candles[0].taker_buy_volume, Some(dec!(60000.0)));
        assert_eq!(candles[1].close, dec!(1.5300));
        assert_eq!(candles[1].open_time.timestamp_millis(), 1_700_000_900_000);
    }

    #[test]
    fn test_open_kline_dropped() {
        let rows: Vec<RawKline> = serde_json::from_str(KLINES).unwrap();
        // Second bar closes at ...1799999, still open here
        let now = Utc.timestamp_millis_opt(1_700_001_000_000).unwrap();
        let candles = closed_klines(rows, now).unwrap();

        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, dec!(1.5100));
    }

    #[test]
    fn test_bad_decimal_errors() {
        let body = r#"[[1700000000000, "x", "1", "1", "1", "1", 1700000899999, "0", 1, "0", "0", "0"]]"#;
        let rows: Vec<RawKline> = serde_json::from_str(body).unwrap();
        let now = Utc.timestamp_millis_opt(1_700_002_000_000).unwrap();
        assert!(closed_klines(rows, now).is_err());
    }

    #[test]
    fn test_find_precision() {
        let body = r#"{"timezone":"UTC","symbols":[
            {"symbol":"BTCUSDT","pricePrecision":2,"quantityPrecision":3,"status":"TRADING"},
            {"symbol":"SUIUSDT","pricePrecision":4,"quantityPrecision":1,"status":"TRADING"}
        ]}"#;
        let info: ExchangeInfo = serde_json::from_str(body).unwrap();

        assert_eq!(find_precision(&info, "SUIUSDT").unwrap(), Precision::new(4, 1));
        assert_eq!(find_precision(&info, "btcusdt").unwrap(), Precision::new(2, 3));
        assert!(find_precision(&info, "DOGEUSDT").is_err());
    }

    #[test]
    fn test_parse_premium_index() {
        let body = r#"{"symbol":"SUIUSDT","markPrice":"1.52340000","indexPrice":"1.52300000"}"#;
        let index: PremiumIndex = serde_json::from_str(body).unwrap();
        assert_eq!(Decimal::from_str(&index.mark_price).unwrap(), dec!(1.5234));
    }
}
