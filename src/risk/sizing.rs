//! Position sizing
//!
//! Commits a fixed fraction of the wallet as margin and scales it by the
//! configured leverage.

use crate::config::RiskConfig;
use crate::exchange::Precision;
use rust_decimal::Decimal;

/// Fixed-fraction, leveraged position sizer
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Fraction of balance committed per entry (e.g., 0.98 = 98%)
    pub risk_fraction: Decimal,
    /// Leverage multiplier
    pub leverage: u32,
}

impl PositionSizer {
    /// Create a new sizer
    pub fn new(risk_fraction: Decimal, leverage: u32) -> Self {
        Self {
            risk_fraction,
            leverage,
        }
    }

    /// Create from RiskConfig
    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.risk_fraction, config.leverage)
    }

    /// Contract quantity for `balance` at `price`, rounded down to the
    /// instrument's quantity precision. Zero when nothing can be afforded.
    pub fn quantity(&self, balance: Decimal, price: Decimal, precision: &Precision) -> Decimal {
        if price <= Decimal::ZERO || balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let notional = balance * self.risk_fraction * Decimal::from(self.leverage);
        precision.round_quantity(notional / price)
    }
}
