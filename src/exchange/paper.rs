//! Paper trading exchange with simulated fills
//!
//! Market orders fill at the current mark price. Bracket legs rest until the
//! mark price crosses their trigger, checked whenever account state is read.
//! Legs are not linked: filling one leaves its sibling resting, exactly like
//! two independent close-position stops on a real venue.

use super::{
    Exchange, ExchangeError, OrderId, OrderIntent, OrderKind, OrderReport, OrderSide, OrderStatus,
    Position, PositionSide, Precision,
};
use crate::feed::MarketData;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Terminal orders kept queryable before the oldest are forgotten
pub const DEFAULT_ORDER_RETENTION: usize = 1_000;

#[derive(Debug, Default)]
struct PaperState {
    balance: Decimal,
    positions: HashMap<String, Position>,
    orders: HashMap<OrderId, OrderReport>,
    client_ids: HashMap<String, OrderId>,
    leverage: HashMap<String, u32>,
    next_order_id: u64,
    /// Filled or cancelled orders, oldest first
    terminal: VecDeque<OrderId>,
    retention: usize,
}

impl PaperState {
    fn position(&self, instrument: &str) -> Position {
        self.positions
            .get(instrument)
            .cloned()
            .unwrap_or_else(|| Position::flat(instrument))
    }

    /// Record a terminal order, forgetting the oldest past the retention count
    fn retire(&mut self, order_id: OrderId) {
        self.terminal.push_back(order_id);
        while self.terminal.len() > self.retention {
            let Some(oldest) = self.terminal.pop_front() else {
                break;
            };
            if let Some(order) = self.orders.remove(&oldest) {
                self.client_ids.remove(&order.client_order_id);
            }
        }
    }

    fn leverage(&self, instrument: &str) -> Decimal {
        Decimal::from(self.leverage.get(instrument).copied().unwrap_or(1))
    }

    /// Apply a fill to the instrument's position and wallet
    fn apply_fill(
        &mut self,
        instrument: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        fee: Decimal,
    ) {
        let mut position = self.position(instrument);
        let opens = side.opens();

        if !position.is_open() {
            position.side = opens;
            position.quantity = quantity;
            position.entry_price = price;
        } else if position.side == opens {
            let total = position.quantity + quantity;
            position.entry_price =
                (position.entry_price * position.quantity + price * quantity) / total;
            position.quantity = total;
        } else {
            let closed = position.quantity.min(quantity);
            let pnl = match position.side {
                PositionSide::Long => (price - position.entry_price) * closed,
                PositionSide::Short => (position.entry_price - price) * closed,
                PositionSide::Flat => Decimal::ZERO,
            };
            self.balance += pnl;
            position.quantity -= closed;

            let remainder = quantity - closed;
            if position.quantity.is_zero() {
                position = Position::flat(instrument);
                if remainder > Decimal::ZERO {
                    position.side = opens;
                    position.quantity = remainder;
                    position.entry_price = price;
                }
            }
        }

        self.balance -= fee;
        if position.is_open() {
            self.positions.insert(instrument.to_string(), position);
        } else {
            self.positions.remove(instrument);
        }
    }
}

/// Whether a resting order fires at `mark`
fn is_triggered(kind: OrderKind, side: OrderSide, trigger: Decimal, mark: Decimal) -> bool {
    match (kind, side) {
        (OrderKind::Market, _) => true,
        (OrderKind::StopLoss, OrderSide::Sell) | (OrderKind::TakeProfit, OrderSide::Buy) => {
            mark <= trigger
        }
        (OrderKind::StopLoss, OrderSide::Buy) | (OrderKind::TakeProfit, OrderSide::Sell) => {
            mark >= trigger
        }
    }
}

/// Paper trading exchange backed by live or scripted market data
pub struct PaperExchange {
    market: Arc<dyn MarketData>,
    fee_rate: Decimal,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    /// Create a paper exchange with the given starting wallet balance
    pub fn new(market: Arc<dyn MarketData>, initial_balance: Decimal) -> Self {
        Self {
            market,
            fee_rate: dec!(0.0005),
            state: Mutex::new(PaperState {
                balance: initial_balance,
                retention: DEFAULT_ORDER_RETENTION,
                ..Default::default()
            }),
        }
    }

    /// Set the taker fee rate charged on every fill
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Keep at most `retention` filled or cancelled orders for lookups
    pub fn with_order_retention(mut self, retention: usize) -> Self {
        self.state.get_mut().retention = retention;
        self
    }

    async fn fetch_mark(&self, instrument: &str) -> Result<Decimal, ExchangeError> {
        self.market
            .mark_price(instrument)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))
    }

    /// Fill any resting bracket legs the current mark price has crossed
    async fn settle(&self, instrument: &str) -> Result<(), ExchangeError> {
        let mark = self.fetch_mark(instrument).await?;
        let mut state = self.state.lock().await;

        let mut triggered: Vec<OrderId> = state
            .orders
            .values()
            .filter(|o| o.instrument == instrument && o.status == OrderStatus::Submitted)
            .filter(|o| {
                o.trigger_price
                    .is_some_and(|trigger| is_triggered(o.kind, o.side, trigger, mark))
            })
            .map(|o| o.order_id.clone())
            .collect();
        triggered.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));

        for order_id in triggered {
            let position = state.position(instrument);
            let Some(order) = state.orders.get(&order_id).cloned() else {
                continue;
            };

            if position.is_open() && position.side.closing_side() == Some(order.side) {
                let fee = position.quantity * mark * self.fee_rate;
                state.apply_fill(instrument, order.side, position.quantity, mark, fee);
                if let Some(order) = state.orders.get_mut(&order_id) {
                    order.status = OrderStatus::Filled;
                    order.avg_price = Some(mark);
                    order.filled_quantity = position.quantity;
                }
                tracing::info!(
                    instrument,
                    order_id = %order_id,
                    kind = %order.kind,
                    price = %mark,
                    "Paper bracket leg filled"
                );
            } else if let Some(order) = state.orders.get_mut(&order_id) {
                // Close-position order with nothing left to close
                order.status = OrderStatus::Canceled;
            }
            state.retire(order_id);
        }

        Ok(())
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<OrderReport, ExchangeError> {
        if let Some(existing) = self.lookup_client_id(&intent.client_order_id).await {
            tracing::debug!(
                client_order_id = %intent.client_order_id,
                "Duplicate client order id, returning original order"
            );
            return Ok(existing);
        }

        if intent.quantity <= Decimal::ZERO {
            return Err(ExchangeError::rejected(
                -4003,
                "Quantity less than or equal to zero.",
            ));
        }

        let mark = self.fetch_mark(&intent.instrument).await?;
        let mut state = self.state.lock().await;

        // Another submission with the same id may have landed while unlocked
        if let Some(order_id) = state.client_ids.get(&intent.client_order_id) {
            if let Some(existing) = state.orders.get(order_id) {
                return Ok(existing.clone());
            }
        }

        let mut report = OrderReport {
            order_id: String::new(),
            client_order_id: intent.client_order_id.clone(),
            instrument: intent.instrument.clone(),
            kind: intent.kind,
            side: intent.side,
            trigger_price: intent.trigger_price,
            quantity: intent.quantity,
            status: OrderStatus::Submitted,
            avg_price: None,
            filled_quantity: Decimal::ZERO,
        };

        match intent.kind {
            OrderKind::Market => {
                let notional = intent.quantity * mark;
                let fee = notional * self.fee_rate;
                let position = state.position(&intent.instrument);
                let increases = !position.is_open() || position.side == intent.side.opens();
                if increases && notional / state.leverage(&intent.instrument) + fee > state.balance
                {
                    return Err(ExchangeError::rejected(-2019, "Margin is insufficient."));
                }

                state.apply_fill(&intent.instrument, intent.side, intent.quantity, mark, fee);
                report.status = OrderStatus::Filled;
                report.avg_price = Some(mark);
                report.filled_quantity = intent.quantity;
            }
            OrderKind::StopLoss | OrderKind::TakeProfit => {
                let Some(trigger) = intent.trigger_price else {
                    return Err(ExchangeError::rejected(
                        -1102,
                        "Mandatory parameter 'stopPrice' was not sent.",
                    ));
                };
                if is_triggered(intent.kind, intent.side, trigger, mark) {
                    return Err(ExchangeError::rejected(-2021, "Order would immediately trigger."));
                }
            }
        }

        state.next_order_id += 1;
        report.order_id = state.next_order_id.to_string();
        state
            .client_ids
            .insert(report.client_order_id.clone(), report.order_id.clone());
        state.orders.insert(report.order_id.clone(), report.clone());
        if report.status == OrderStatus::Filled {
            state.retire(report.order_id.clone());
        }

        tracing::info!(
            instrument = %report.instrument,
            order_id = %report.order_id,
            kind = %report.kind,
            side = ?report.side,
            status = ?report.status,
            "Paper order accepted"
        );
        Ok(report)
    }

    async fn cancel_order(&self, instrument: &str, order_id: &str) -> Result<(), ExchangeError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(order_id)
            .filter(|o| o.instrument == instrument)
            .ok_or_else(|| ExchangeError::UnknownOrder(order_id.to_string()))?;

        if order.status == OrderStatus::Submitted {
            order.status = OrderStatus::Canceled;
            state.retire(order_id.to_string());
            tracing::info!(instrument, order_id, "Paper order cancelled");
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, instrument: &str) -> Result<(), ExchangeError> {
        let mut state = self.state.lock().await;
        let mut cancelled = Vec::new();
        for order in state.orders.values_mut() {
            if order.instrument == instrument && order.status == OrderStatus::Submitted {
                order.status = OrderStatus::Canceled;
                cancelled.push(order.order_id.clone());
            }
        }
        cancelled.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));
        let count = cancelled.len();
        for order_id in cancelled {
            state.retire(order_id);
        }
        tracing::info!(instrument, cancelled = count, "Paper open orders cancelled");
        Ok(())
    }

    async fn order_status(
        &self,
        instrument: &str,
        order_id: &str,
    ) -> Result<OrderReport, ExchangeError> {
        self.settle(instrument).await?;
        let state = self.state.lock().await;
        state
            .orders
            .get(order_id)
            .filter(|o| o.instrument == instrument)
            .cloned()
            .ok_or_else(|| ExchangeError::UnknownOrder(order_id.to_string()))
    }

    async fn open_orders(&self, instrument: &str) -> Result<Vec<OrderReport>, ExchangeError> {
        self.settle(instrument).await?;
        let state = self.state.lock().await;
        let mut orders: Vec<OrderReport> = state
            .orders
            .values()
            .filter(|o| o.instrument == instrument && o.status == OrderStatus::Submitted)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.order_id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(orders)
    }

    async fn position(&self, instrument: &str) -> Result<Position, ExchangeError> {
        self.settle(instrument).await?;
        let state = self.state.lock().await;
        Ok(state.position(instrument))
    }

    async fn balance(&self) -> Result<Decimal, ExchangeError> {
        Ok(self.state.lock().await.balance)
    }

    async fn mark_price(&self, instrument: &str) -> Result<Decimal, ExchangeError> {
        self.fetch_mark(instrument).await
    }

    async fn precision(&self, instrument: &str) -> Result<Precision, ExchangeError> {
        self.market
            .precision(instrument)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))
    }

    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<(), ExchangeError> {
        if leverage == 0 || leverage > 125 {
            return Err(ExchangeError::rejected(-4028, "Leverage is not valid."));
        }
        let mut state = self.state.lock().await;
        state.leverage.insert(instrument.to_string(), leverage);
        tracing::info!(instrument, leverage, "Paper leverage set");
        Ok(())
    }
}

impl PaperExchange {
    async fn lookup_client_id(&self, client_order_id: &str) -> Option<OrderReport> {
        let state = self.state.lock().await;
        let order_id = state.client_ids.get(client_order_id)?;
        state.orders.get(order_id).cloned()
    }
}
