//! Volume spike detection

use super::{Direction, Signal};
use crate::candle::{Candle, CandleError};
use crate::config::{Classifier, SignalConfig};
use rust_decimal::Decimal;

/// Classifies the latest bar of a window by its volume Z-score
#[derive(Debug, Clone)]
pub struct SignalDetector {
    zscore_threshold: f64,
    min_volume: Decimal,
    classifier: Classifier,
    taker_buy_ratio: Decimal,
    taker_sell_ratio: Decimal,
}

impl SignalDetector {
    /// Create a detector firing at `zscore_threshold` standard deviations
    pub fn new(zscore_threshold: f64) -> Self {
        Self {
            zscore_threshold,
            min_volume: Decimal::ZERO,
            classifier: Classifier::Candle,
            taker_buy_ratio: Decimal::new(6, 1),
            taker_sell_ratio: Decimal::new(4, 1),
        }
    }

    /// Create from SignalConfig
    pub fn from_config(config: &SignalConfig) -> Self {
        let detector = Self::new(config.zscore_threshold).with_min_volume(config.min_volume);
        match config.classifier {
            Classifier::Candle => detector,
            Classifier::TakerRatio => {
                detector.with_taker_ratio(config.taker_buy_ratio, config.taker_sell_ratio)
            }
        }
    }

    /// Classify spikes by taker-buy share: above `buy` buys, below `sell`
    /// sells, in between is mixed flow and ignored
    pub fn with_taker_ratio(mut self, buy: Decimal, sell: Decimal) -> Self {
        self.classifier = Classifier::TakerRatio;
        self.taker_buy_ratio = buy;
        self.taker_sell_ratio = sell;
        self
    }

    /// Ignore spikes whose raw volume does not exceed `min_volume`
    pub fn with_min_volume(mut self, min_volume: Decimal) -> Self {
        self.min_volume = min_volume;
        self
    }

    pub fn zscore_threshold(&self) -> f64 {
        self.zscore_threshold
    }

    /// Classify the newest candle of `window`
    ///
    /// The baseline is every candle except the newest. A flat baseline has no
    /// spread to measure against and yields `Direction::None`.
    pub fn detect(&self, window: &[Candle]) -> Result<Signal, CandleError> {
        let (latest, baseline) = match window.split_last() {
            Some((latest, baseline)) if !baseline.is_empty() => (latest, baseline),
            _ => {
                return Err(CandleError::InsufficientData {
                    required: 2,
                    available: window.len(),
                })
            }
        };

        let Some(zscore) = volume_zscore(baseline, latest.volume) else {
            tracing::debug!(
                bar = %latest.open_time,
                "Degenerate volume baseline, no signal"
            );
            return Ok(Signal::none(latest.open_time, 0.0));
        };

        let is_spike = zscore >= self.zscore_threshold && latest.volume > self.min_volume;
        let direction = if is_spike {
            self.classify(latest)
        } else {
            Direction::None
        };

        Ok(Signal {
            timestamp: latest.open_time,
            direction,
            zscore,
        })
    }

    /// Direction of a bar already known to be a spike
    fn classify(&self, bar: &Candle) -> Direction {
        match self.classifier {
            Classifier::Candle if bar.is_bullish() => Direction::Buy,
            Classifier::Candle if bar.is_bearish() => Direction::Sell,
            Classifier::Candle => Direction::None,
            Classifier::TakerRatio => match bar.taker_buy_ratio() {
                Some(ratio) if ratio > self.taker_buy_ratio => Direction::Buy,
                Some(ratio) if ratio < self.taker_sell_ratio => Direction::Sell,
                Some(ratio) => {
                    tracing::debug!(bar = %bar.open_time, %ratio, "Mixed taker flow, no signal");
                    Direction::None
                }
                None => {
                    tracing::debug!(bar = %bar.open_time, "No taker volume on bar, no signal");
                    Direction::None
                }
            },
        }
    }
}

/// Z-score of `value` against the sample mean and standard deviation of
/// `baseline` volumes. `None` when the deviation is zero or undefined.
fn volume_zscore(baseline: &[Candle], value: Decimal) -> Option<f64> {
    if baseline.len() < 2 {
        return None;
    }

    let volumes: Vec<f64> = baseline
        .iter()
        .map(|c| f64::try_from(c.volume).unwrap_or(0.0))
        .collect();

    let n = volumes.len() as f64;
    let mean = volumes.iter().sum::<f64>() / n;
    let variance = volumes.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if !std_dev.is_finite() || std_dev <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }

    let value = f64::try_from(value).unwrap_or(0.0);
    Some((value - mean) / std_dev)
}
