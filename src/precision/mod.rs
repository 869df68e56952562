//! Instrument precision lookup
//!
//! Price and quantity decimal places, fetched once per instrument and kept
//! for the life of the process.

use crate::exchange::{Exchange, Precision};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Precision lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrecisionError {
    /// Metadata could not be fetched; no trade may be placed this cycle
    #[error("Metadata unavailable for {instrument}: {reason}")]
    MetadataUnavailable { instrument: String, reason: String },
}

/// Caching precision resolver
pub struct PrecisionResolver {
    exchange: Arc<dyn Exchange>,
    timeout: Duration,
    cache: HashMap<String, Precision>,
}

impl PrecisionResolver {
    /// Create a resolver bounding each fetch by `timeout`
    pub fn new(exchange: Arc<dyn Exchange>, timeout: Duration) -> Self {
        Self {
            exchange,
            timeout,
            cache: HashMap::new(),
        }
    }

    /// Precision for `instrument`, fetching on first use
    pub async fn precision_for(&mut self, instrument: &str) -> Result<Precision, PrecisionError> {
        if let Some(precision) = self.cache.get(instrument) {
            return Ok(*precision);
        }

        let fetched = tokio::time::timeout(self.timeout, self.exchange.precision(instrument)).await;
        let precision = match fetched {
            Ok(Ok(precision)) => precision,
            Ok(Err(e)) => {
                return Err(PrecisionError::MetadataUnavailable {
                    instrument: instrument.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(PrecisionError::MetadataUnavailable {
                    instrument: instrument.to_string(),
                    reason: format!("timed out after {:?}", self.timeout),
                })
            }
        };

        tracing::info!(
            instrument,
            price_precision = precision.price_precision,
            quantity_precision = precision.quantity_precision,
            "Resolved instrument precision"
        );
        self.cache.insert(instrument.to_string(), precision);
        Ok(precision)
    }

    /// Whether `instrument` is already cached
    pub fn is_cached(&self, instrument: &str) -> bool {
        self.cache.contains_key(instrument)
    }
}
