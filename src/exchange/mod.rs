//! Exchange module
//!
//! Order submission, cancellation, and account state for USDⓈ-M futures

mod error;
mod paper;
mod types;

pub use error::ExchangeError;
pub use paper::PaperExchange;
pub use types::{
    OrderId, OrderIntent, OrderKind, OrderReport, OrderSide, OrderStatus, Position, PositionSide,
    Precision,
};

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Trait for exchange implementations
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Submit an order; a repeated `client_order_id` returns the original order
    async fn submit_order(&self, intent: &OrderIntent) -> Result<OrderReport, ExchangeError>;
    /// Cancel a resting order; canceling a finished order is a no-op
    async fn cancel_order(&self, instrument: &str, order_id: &str) -> Result<(), ExchangeError>;
    /// Cancel every resting order on an instrument
    async fn cancel_all_orders(&self, instrument: &str) -> Result<(), ExchangeError>;
    /// Current state of one order
    async fn order_status(&self, instrument: &str, order_id: &str)
        -> Result<OrderReport, ExchangeError>;
    /// Resting orders on an instrument
    async fn open_orders(&self, instrument: &str) -> Result<Vec<OrderReport>, ExchangeError>;
    /// Current position (flat when none)
    async fn position(&self, instrument: &str) -> Result<Position, ExchangeError>;
    /// Available wallet balance in the quote asset
    async fn balance(&self) -> Result<Decimal, ExchangeError>;
    async fn mark_price(&self, instrument: &str) -> Result<Decimal, ExchangeError>;
    async fn precision(&self, instrument: &str) -> Result<Precision, ExchangeError>;
    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<(), ExchangeError>;
}
