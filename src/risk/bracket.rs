//! Stop-loss / take-profit levels

use crate::config::RiskConfig;
use crate::exchange::{PositionSide, Precision};
use rust_decimal::Decimal;

/// Bracket distances from entry, as fractions
#[derive(Debug, Clone)]
pub struct BracketSpec {
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}

/// Trigger prices for one position's bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketLevels {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl BracketSpec {
    pub fn new(stop_loss_pct: Decimal, take_profit_pct: Decimal) -> Self {
        Self {
            stop_loss_pct,
            take_profit_pct,
        }
    }

    /// Create from RiskConfig
    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.stop_loss_pct, config.take_profit_pct)
    }

    /// Levels around `entry_price`, rounded to the price precision.
    /// `None` for a flat position.
    pub fn levels(
        &self,
        side: PositionSide,
        entry_price: Decimal,
        precision: &Precision,
    ) -> Option<BracketLevels> {
        let (stop_loss, take_profit) = match side {
            PositionSide::Long => (
                entry_price * (Decimal::ONE - self.stop_loss_pct),
                entry_price * (Decimal::ONE + self.take_profit_pct),
            ),
            PositionSide::Short => (
                entry_price * (Decimal::ONE + self.stop_loss_pct),
                entry_price * (Decimal::ONE - self.take_profit_pct),
            ),
            PositionSide::Flat => return None,
        };

        Some(BracketLevels {
            stop_loss: precision.round_price(stop_loss),
            take_profit: precision.round_price(take_profit),
        })
    }
}
