//! Exchange errors

use std::time::Duration;
use thiserror::Error;

/// Failures reported by an exchange call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Network or server-side failure; safe to retry
    #[error("Transport error: {0}")]
    Transport(String),
    /// No response within the request timeout; safe to retry
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The exchange refused the request (invalid quantity, margin, ...)
    #[error("Rejected by exchange (code {code}): {reason}")]
    Rejected { code: i64, reason: String },
    #[error("Unknown order: {0}")]
    UnknownOrder(String),
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
}

impl ExchangeError {
    pub fn rejected(code: i64, reason: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            reason: reason.into(),
        }
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::Transport(_) | ExchangeError::Timeout(_))
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Transport(_) => "transport",
            ExchangeError::Timeout(_) => "timeout",
            ExchangeError::Rejected { .. } => "exchange_rejection",
            ExchangeError::UnknownOrder(_) => "unknown_order",
            ExchangeError::UnknownInstrument(_) => "unknown_instrument",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ExchangeError::Transport("reset".into()).is_retryable());
        assert!(ExchangeError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(!ExchangeError::rejected(-4003, "Quantity less than zero").is_retryable());
        assert!(!ExchangeError::UnknownOrder("7".into()).is_retryable());
    }

    #[test]
    fn test_rejected_display() {
        let err = ExchangeError::rejected(-2019, "Margin is insufficient");
        assert_eq!(
            err.to_string(),
            "Rejected by exchange (code -2019): Margin is insufficient"
        );
        assert_eq!(err.kind(), "exchange_rejection");
    }
}
