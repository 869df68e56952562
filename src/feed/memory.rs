//! In-memory market data
//!
//! Serves scripted candles, mark prices, and precision. Used for offline
//! dry runs and for driving the pipeline deterministically in tests.

use super::{CandleFeed, MarketData};
use crate::candle::Candle;
use crate::exchange::Precision;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct MarketState {
    candles: HashMap<String, Vec<Candle>>,
    mark_prices: HashMap<String, Decimal>,
    precisions: HashMap<String, Precision>,
}

/// Scripted market data keyed by instrument
#[derive(Debug, Default)]
pub struct InMemoryMarket {
    state: RwLock<MarketState>,
}

impl InMemoryMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mark_price(&self, instrument: &str, price: Decimal) {
        if let Ok(mut state) = self.state.write() {
            state.mark_prices.insert(instrument.to_string(), price);
        }
    }

    pub fn set_precision(&self, instrument: &str, precision: Precision) {
        if let Ok(mut state) = self.state.write() {
            state.precisions.insert(instrument.to_string(), precision);
        }
    }

    /// Publish a closed candle; the mark price follows its close
    pub fn push_candle(&self, instrument: &str, candle: Candle) {
        if let Ok(mut state) = self.state.write() {
            state
                .mark_prices
                .insert(instrument.to_string(), candle.close);
            state
                .candles
                .entry(instrument.to_string())
                .or_default()
                .push(candle);
        }
    }
}

#[async_trait]
impl CandleFeed for InMemoryMarket {
    async fn closed_candles(
        &self,
        instrument: &str,
        _interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Candle>> {
        let state = self
            .state
            .read()
            .map_err(|_| anyhow::anyhow!("Market state poisoned"))?;
        let candles = state.candles.get(instrument).map(Vec::as_slice).unwrap_or(&[]);
        let skip = candles.len().saturating_sub(limit);
        Ok(candles[skip..].to_vec())
    }
}

#[async_trait]
impl MarketData for InMemoryMarket {
    async fn mark_price(&self, instrument: &str) -> anyhow::Result<Decimal> {
        let state = self
            .state
            .read()
            .map_err(|_| anyhow::anyhow!("Market state poisoned"))?;
        state
            .mark_prices
            .get(instrument)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("No mark price for {}", instrument))
    }

    async fn precision(&self, instrument: &str) -> anyhow::Result<Precision> {
        let state = self
            .state
            .read()
            .map_err(|_| anyhow::anyhow!("Market state poisoned"))?;
        state
            .precisions
            .get(instrument)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Unknown instrument: {}", instrument))
    }
}
