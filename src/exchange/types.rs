//! Exchange types

use crate::signal::Direction;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-assigned order identifier
pub type OrderId = String;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Entry side for a signal direction
    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Buy => Some(OrderSide::Buy),
            Direction::Sell => Some(OrderSide::Sell),
            Direction::None => None,
        }
    }

    /// Position side this order opens
    pub fn opens(self) -> PositionSide {
        match self {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Immediate entry at market
    Market,
    /// Close-position stop below (long) or above (short) entry
    StopLoss,
    /// Close-position stop on the profitable side of entry
    TakeProfit,
}

impl OrderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::StopLoss => "stop_loss",
            OrderKind::TakeProfit => "take_profit",
        }
    }

    pub fn is_bracket_leg(self) -> bool {
        matches!(self, OrderKind::StopLoss | OrderKind::TakeProfit)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Built locally, not yet acknowledged
    Pending,
    /// Acknowledged and resting on the exchange
    Submitted,
    Filled,
    Canceled,
    /// Rejected, expired, or given up on after retries
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Failed
        )
    }
}

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

impl PositionSide {
    /// Order side that closes this position
    pub fn closing_side(self) -> Option<OrderSide> {
        match self {
            PositionSide::Long => Some(OrderSide::Sell),
            PositionSide::Short => Some(OrderSide::Buy),
            PositionSide::Flat => None,
        }
    }
}

/// Open exposure on one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
}

impl Position {
    pub fn flat(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            side: PositionSide::Flat,
            entry_price: Decimal::ZERO,
            quantity: Decimal::ZERO,
        }
    }

    pub fn is_open(&self) -> bool {
        self.side != PositionSide::Flat && !self.quantity.is_zero()
    }
}

/// Decimal places the exchange accepts for an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precision {
    pub price_precision: u32,
    pub quantity_precision: u32,
}

impl Precision {
    pub fn new(price_precision: u32, quantity_precision: u32) -> Self {
        Self {
            price_precision,
            quantity_precision,
        }
    }

    /// Round a price to the nearest allowed tick
    pub fn round_price(&self, price: Decimal) -> Decimal {
        price.round_dp_with_strategy(self.price_precision, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Round a quantity down so it never exceeds what was sized
    pub fn round_quantity(&self, quantity: Decimal) -> Decimal {
        quantity.round_dp_with_strategy(self.quantity_precision, RoundingStrategy::ToZero)
    }
}

/// An order the controller wants on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Idempotency key, reused verbatim across retries
    pub client_order_id: String,
    pub instrument: String,
    pub kind: OrderKind,
    pub side: OrderSide,
    /// Trigger price for bracket legs
    pub trigger_price: Option<Decimal>,
    pub quantity: Decimal,
    pub status: OrderStatus,
    /// Submission attempts made so far
    pub attempts: u32,
    /// Exchange identifier once acknowledged
    pub order_id: Option<OrderId>,
}

impl OrderIntent {
    /// Market entry
    pub fn market(
        client_order_id: impl Into<String>,
        instrument: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self::new(client_order_id, instrument, OrderKind::Market, side, None, quantity)
    }

    /// Close-position bracket leg
    pub fn bracket_leg(
        client_order_id: impl Into<String>,
        instrument: impl Into<String>,
        kind: OrderKind,
        side: OrderSide,
        trigger_price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self::new(
            client_order_id,
            instrument,
            kind,
            side,
            Some(trigger_price),
            quantity,
        )
    }

    fn new(
        client_order_id: impl Into<String>,
        instrument: impl Into<String>,
        kind: OrderKind,
        side: OrderSide,
        trigger_price: Option<Decimal>,
        quantity: Decimal,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            instrument: instrument.into(),
            kind,
            side,
            trigger_price,
            quantity,
            status: OrderStatus::Pending,
            attempts: 0,
            order_id: None,
        }
    }

    /// Record an exchange acknowledgment
    pub fn acknowledge(&mut self, report: &OrderReport) {
        self.order_id = Some(report.order_id.clone());
        self.status = report.status;
    }

    /// Rebuild an intent from a resting order found on the exchange
    pub fn from_report(report: &OrderReport) -> Self {
        Self {
            client_order_id: report.client_order_id.clone(),
            instrument: report.instrument.clone(),
            kind: report.kind,
            side: report.side,
            trigger_price: report.trigger_price,
            quantity: report.quantity,
            status: report.status,
            attempts: 1,
            order_id: Some(report.order_id.clone()),
        }
    }
}

/// Exchange view of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub order_id: OrderId,
    pub client_order_id: String,
    pub instrument: String,
    pub kind: OrderKind,
    pub side: OrderSide,
    pub trigger_price: Option<Decimal>,
    pub quantity: Decimal,
    pub status: OrderStatus,
    /// Average fill price, when anything filled
    pub avg_price: Option<Decimal>,
    pub filled_quantity: Decimal,
}
