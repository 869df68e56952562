//! Order controller errors

use super::retry::RetryError;
use crate::exchange::{ExchangeError, OrderKind};
use crate::precision::PrecisionError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures of one controller cycle
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Precision unknown; nothing was placed this cycle
    #[error(transparent)]
    Metadata(#[from] PrecisionError),
    /// Retryable submission failures used up the attempt budget
    #[error("{kind} submission failed after {attempts} attempts: {source}")]
    Submission {
        kind: OrderKind,
        attempts: u32,
        source: ExchangeError,
    },
    /// The exchange refused the order; not retried
    #[error("{kind} rejected: {source}")]
    Rejected {
        kind: OrderKind,
        source: ExchangeError,
    },
    /// Sizing produced nothing tradeable
    #[error("Quantity rounds to zero (balance {balance}, price {price})")]
    QuantityTooSmall { balance: Decimal, price: Decimal },
    /// Reading account or order state failed
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

impl ControllerError {
    /// Classify a failed order submission
    pub fn from_submission(kind: OrderKind, error: RetryError) -> Self {
        match error {
            RetryError::Exhausted { attempts, last } => ControllerError::Submission {
                kind,
                attempts,
                source: last,
            },
            RetryError::Fatal { error, .. } => ControllerError::Rejected {
                kind,
                source: error,
            },
        }
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerError::Metadata(_) => "metadata_unavailable",
            ControllerError::Submission { .. } => "order_submission",
            ControllerError::Rejected { .. } => "exchange_rejection",
            ControllerError::QuantityTooSmall { .. } => "quantity_too_small",
            ControllerError::Exchange(e) => e.kind(),
        }
    }
}
