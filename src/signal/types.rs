//! Signal types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction implied by a volume spike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Spike on a green bar
    Buy,
    /// Spike on a red bar
    Sell,
    /// No actionable spike
    None,
}

impl Direction {
    pub fn is_actionable(self) -> bool {
        !matches!(self, Direction::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::None => "NONE",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the latest closed bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Open time of the bar that was classified
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// Volume Z-score of the bar (0.0 when the baseline is degenerate)
    pub zscore: f64,
}

impl Signal {
    /// A non-actionable signal
    pub fn none(timestamp: DateTime<Utc>, zscore: f64) -> Self {
        Self {
            timestamp,
            direction: Direction::None,
            zscore,
        }
    }
}
