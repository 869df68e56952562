//! Market data module
//!
//! Closed candles, mark prices, and instrument metadata

mod binance;
mod memory;

pub use binance::{BinanceConfig, BinanceFuturesClient, BINANCE_FUTURES_URL};
pub use memory::InMemoryMarket;

use crate::candle::Candle;
use crate::exchange::Precision;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Source of closed bars
#[async_trait]
pub trait CandleFeed: Send + Sync {
    /// Up to `limit` most recent closed candles, oldest first
    async fn closed_candles(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Candle>>;
}

/// Source of prices and instrument metadata
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn mark_price(&self, instrument: &str) -> anyhow::Result<Decimal>;
    async fn precision(&self, instrument: &str) -> anyhow::Result<Precision>;
}
