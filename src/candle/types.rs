//! Candle types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A closed fixed-duration bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time
    pub open_time: DateTime<Utc>,
    /// Bar close time
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Traded base-asset volume
    pub volume: Decimal,
    /// Base-asset volume bought by takers, when the source reports it
    #[serde(default)]
    pub taker_buy_volume: Option<Decimal>,
}

impl Candle {
    /// Green bar: closed above its open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Red bar: closed below its open
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Share of volume bought by takers, in `[0, 1]`
    pub fn taker_buy_ratio(&self) -> Option<Decimal> {
        let taker_buy = self.taker_buy_volume?;
        if self.volume <= Decimal::ZERO {
            return None;
        }
        Some(taker_buy / self.volume)
    }
}

/// Candle window errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandleError {
    /// Not enough closed bars have accumulated yet
    #[error("Insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },
}
