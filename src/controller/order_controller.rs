//! Per-instrument order lifecycle
//!
//! Every cycle first reconciles the local state with what the exchange
//! reports, then acts on the cycle's signal. The controller never trusts its
//! own bookkeeping over exchange facts: a filled bracket leg, a position
//! closed by hand, or a stop canceled from the UI all show up here.

use super::error::ControllerError;
use super::retry::RetryPolicy;
use super::state::InstrumentState;
use crate::config::Config;
use crate::exchange::{
    Exchange, ExchangeError, OrderIntent, OrderKind, OrderReport, OrderSide, OrderStatus,
    Position,
};
use crate::precision::PrecisionResolver;
use crate::risk::{BracketSpec, PositionSizer};
use crate::signal::Signal;
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bound an exchange call by `timeout`
async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, ExchangeError>>,
) -> Result<T, ExchangeError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::Timeout(timeout)),
    }
}

/// Short random prefix keeping client order ids unique across restarts
fn new_session() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Order lifecycle controller for one instrument
pub struct OrderController {
    instrument: String,
    exchange: Arc<dyn Exchange>,
    precision: PrecisionResolver,
    sizer: PositionSizer,
    bracket: BracketSpec,
    retry: RetryPolicy,
    request_timeout: Duration,
    state: InstrumentState,
    /// Local state may not match the exchange; rebuild before acting
    uncertain: bool,
    session: String,
    sequence: u64,
}

impl OrderController {
    /// Create a controller. It starts uncertain, so the first cycle adopts
    /// whatever position and orders already exist on the exchange.
    pub fn new(instrument: impl Into<String>, exchange: Arc<dyn Exchange>, config: &Config) -> Self {
        let request_timeout = config.execution.request_timeout();
        Self {
            instrument: instrument.into(),
            precision: PrecisionResolver::new(exchange.clone(), request_timeout),
            exchange,
            sizer: PositionSizer::from_config(&config.risk),
            bracket: BracketSpec::from_config(&config.risk),
            retry: RetryPolicy::from_config(&config.retry),
            request_timeout,
            state: InstrumentState::Flat,
            uncertain: true,
            session: new_session(),
            sequence: 0,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fix the client order id prefix
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    pub fn is_uncertain(&self) -> bool {
        self.uncertain
    }

    /// Force the next cycle to rebuild state from the exchange
    pub fn mark_uncertain(&mut self) {
        self.uncertain = true;
    }

    /// Run one cycle: reconcile with the exchange, then act on `signal`
    pub async fn on_cycle(&mut self, signal: &Signal) -> Result<(), ControllerError> {
        if self.uncertain {
            self.rebuild().await?;
            self.uncertain = false;
        } else {
            self.reconcile().await?;
        }

        let result = self.act(signal).await;
        telemetry::set_state(&self.instrument, self.state.code());
        result
    }

    fn transition(&mut self, next: InstrumentState, reason: &'static str) {
        if next.name() != self.state.name() {
            tracing::info!(
                instrument = %self.instrument,
                from = self.state.name(),
                to = next.name(),
                reason,
                "State transition"
            );
        }
        self.state = next;
    }

    fn client_order_id(&self, sequence: u64, tag: &str) -> String {
        format!("vs-{}-{}-{}", self.session, sequence, tag)
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    async fn position(&self) -> Result<Position, ExchangeError> {
        bounded(self.request_timeout, self.exchange.position(&self.instrument)).await
    }

    async fn open_orders(&self) -> Result<Vec<OrderReport>, ExchangeError> {
        bounded(self.request_timeout, self.exchange.open_orders(&self.instrument)).await
    }

    async fn cancel_all(&self) -> Result<(), ExchangeError> {
        bounded(
            self.request_timeout,
            self.exchange.cancel_all_orders(&self.instrument),
        )
        .await
    }

    /// Exchange status of a tracked order; untracked ids count as failed
    async fn status_of(&self, intent: &OrderIntent) -> Result<OrderStatus, ExchangeError> {
        let Some(order_id) = intent.order_id.as_deref() else {
            return Ok(OrderStatus::Failed);
        };
        let report = bounded(
            self.request_timeout,
            self.exchange.order_status(&self.instrument, order_id),
        )
        .await?;
        Ok(report.status)
    }

    async fn cancel(&self, intent: &OrderIntent) -> Result<(), ExchangeError> {
        match intent.order_id.as_deref() {
            Some(order_id) => {
                bounded(
                    self.request_timeout,
                    self.exchange.cancel_order(&self.instrument, order_id),
                )
                .await
            }
            None => Ok(()),
        }
    }

    /// Derive state purely from exchange facts
    async fn rebuild(&mut self) -> Result<(), ControllerError> {
        let position = self.position().await?;
        let open = self.open_orders().await?;

        if !position.is_open() {
            if !open.is_empty() {
                tracing::warn!(
                    instrument = %self.instrument,
                    count = open.len(),
                    "Cancelling orders left without a position"
                );
                self.cancel_all().await?;
            }
            self.transition(InstrumentState::Flat, "rebuild");
            return Ok(());
        }

        let closing = position.side.closing_side();
        let leg = |kind: OrderKind| {
            open.iter()
                .find(|o| o.kind == kind && Some(o.side) == closing)
                .map(OrderIntent::from_report)
        };
        let next = match (leg(OrderKind::StopLoss), leg(OrderKind::TakeProfit)) {
            (Some(stop_loss), Some(take_profit)) => InstrumentState::BracketActive {
                position,
                stop_loss,
                take_profit,
            },
            _ => InstrumentState::PositionOpen { position },
        };

        tracing::info!(
            instrument = %self.instrument,
            state = next.name(),
            open_orders = open.len(),
            "Rebuilt state from exchange"
        );
        self.state = next;
        Ok(())
    }

    /// Bring the tracked state in line with the exchange
    async fn reconcile(&mut self) -> Result<(), ControllerError> {
        match self.state.clone() {
            InstrumentState::Flat => {
                let position = self.position().await?;
                if position.is_open() {
                    tracing::warn!(
                        instrument = %self.instrument,
                        side = ?position.side,
                        quantity = %position.quantity,
                        "Adopting untracked position"
                    );
                    self.transition(InstrumentState::PositionOpen { position }, "untracked_position");
                }
            }
            InstrumentState::EntryPending { entry } => {
                let position = self.position().await?;
                if position.is_open() {
                    self.transition(InstrumentState::PositionOpen { position }, "entry_filled");
                } else if self.status_of(&entry).await?.is_terminal() {
                    self.transition(InstrumentState::Flat, "entry_not_filled");
                }
            }
            InstrumentState::PositionOpen { .. } => {
                let position = self.position().await?;
                if position.is_open() {
                    self.state = InstrumentState::PositionOpen { position };
                } else {
                    self.cancel_all().await?;
                    self.transition(InstrumentState::Flat, "position_closed");
                }
            }
            InstrumentState::BracketActive {
                stop_loss,
                take_profit,
                ..
            } => {
                self.reconcile_bracket(&stop_loss, &take_profit).await?;
            }
        }
        Ok(())
    }

    async fn reconcile_bracket(
        &mut self,
        stop_loss: &OrderIntent,
        take_profit: &OrderIntent,
    ) -> Result<(), ControllerError> {
        let sl_status = self.status_of(stop_loss).await?;
        let tp_status = self.status_of(take_profit).await?;

        let filled = match (sl_status, tp_status) {
            (OrderStatus::Filled, _) => Some((stop_loss, take_profit)),
            (_, OrderStatus::Filled) => Some((take_profit, stop_loss)),
            _ => None,
        };
        if let Some((leg, sibling)) = filled {
            self.cancel(sibling).await?;
            tracing::info!(
                instrument = %self.instrument,
                leg = %leg.kind,
                trigger = ?leg.trigger_price,
                "Bracket leg filled, sibling cancelled"
            );
            telemetry::increment(CounterMetric::PositionClosed, &self.instrument, leg.kind.as_str());
            self.transition(InstrumentState::Flat, "bracket_filled");
            return Ok(());
        }

        let current = self.position().await?;
        if !current.is_open() {
            self.cancel_all().await?;
            self.transition(InstrumentState::Flat, "position_closed");
            return Ok(());
        }

        if sl_status.is_terminal() || tp_status.is_terminal() {
            tracing::warn!(
                instrument = %self.instrument,
                stop_loss = ?sl_status,
                take_profit = ?tp_status,
                "Bracket leg gone without a fill, replacing bracket"
            );
            self.cancel_all().await?;
            self.transition(
                InstrumentState::PositionOpen { position: current },
                "bracket_broken",
            );
        }
        Ok(())
    }

    async fn act(&mut self, signal: &Signal) -> Result<(), ControllerError> {
        if self.state.is_flat() {
            if let Some(side) = OrderSide::from_direction(signal.direction) {
                self.enter(side).await?;
            }
        } else if signal.direction.is_actionable() {
            tracing::info!(
                instrument = %self.instrument,
                state = self.state.name(),
                direction = %signal.direction,
                "Signal deferred, instrument busy"
            );
            telemetry::increment(
                CounterMetric::SignalDeferred,
                &self.instrument,
                signal.direction.as_str(),
            );
        }

        // A naked position is protected before anything else happens
        if let InstrumentState::PositionOpen { position } = &self.state {
            let position = position.clone();
            self.place_bracket(position).await?;
        }
        Ok(())
    }

    async fn enter(&mut self, side: OrderSide) -> Result<(), ControllerError> {
        let precision = self.precision.precision_for(&self.instrument).await?;

        let strays = self.open_orders().await?;
        if !strays.is_empty() {
            tracing::warn!(
                instrument = %self.instrument,
                count = strays.len(),
                "Cancelling stray orders before entry"
            );
            self.cancel_all().await?;
        }

        let balance = bounded(self.request_timeout, self.exchange.balance()).await?;
        let price = bounded(
            self.request_timeout,
            self.exchange.mark_price(&self.instrument),
        )
        .await?;
        let quantity = self.sizer.quantity(balance, price, &precision);
        if quantity.is_zero() {
            return Err(ControllerError::QuantityTooSmall { balance, price });
        }

        let sequence = self.next_sequence();
        let mut entry = OrderIntent::market(
            self.client_order_id(sequence, "en"),
            &self.instrument,
            side,
            quantity,
        );
        tracing::info!(
            instrument = %self.instrument,
            side = ?side,
            quantity = %quantity,
            price = %price,
            client_order_id = %entry.client_order_id,
            "Submitting entry"
        );

        let report = match self.submit(&mut entry).await {
            Ok(report) => report,
            Err(e) => {
                self.transition(InstrumentState::Flat, "entry_failed");
                return Err(e);
            }
        };

        match report.status {
            OrderStatus::Filled => {
                let position = Position {
                    instrument: self.instrument.clone(),
                    side: side.opens(),
                    entry_price: report.avg_price.unwrap_or(price),
                    quantity: report.filled_quantity,
                };
                self.transition(InstrumentState::PositionOpen { position }, "entry_filled");
            }
            OrderStatus::Pending | OrderStatus::Submitted => {
                self.transition(InstrumentState::EntryPending { entry }, "entry_submitted");
            }
            OrderStatus::Canceled | OrderStatus::Failed => {
                tracing::warn!(
                    instrument = %self.instrument,
                    status = ?report.status,
                    "Entry finished without a fill"
                );
                self.transition(InstrumentState::Flat, "entry_not_filled");
            }
        }
        Ok(())
    }

    async fn place_bracket(&mut self, position: Position) -> Result<(), ControllerError> {
        let precision = self.precision.precision_for(&self.instrument).await?;
        let (Some(levels), Some(close_side)) = (
            self.bracket
                .levels(position.side, position.entry_price, &precision),
            position.side.closing_side(),
        ) else {
            self.transition(InstrumentState::Flat, "position_closed");
            return Ok(());
        };

        // Clear partial legs left by an earlier attempt
        self.cancel_all().await?;

        let sequence = self.next_sequence();
        let mut stop_loss = OrderIntent::bracket_leg(
            self.client_order_id(sequence, "sl"),
            &self.instrument,
            OrderKind::StopLoss,
            close_side,
            levels.stop_loss,
            position.quantity,
        );
        let mut take_profit = OrderIntent::bracket_leg(
            self.client_order_id(sequence, "tp"),
            &self.instrument,
            OrderKind::TakeProfit,
            close_side,
            levels.take_profit,
            position.quantity,
        );

        // A lone stop-loss stays resting if the take-profit fails; the next
        // attempt replaces both
        self.submit(&mut stop_loss).await?;
        self.submit(&mut take_profit).await?;

        tracing::info!(
            instrument = %self.instrument,
            entry = %position.entry_price,
            stop_loss = %levels.stop_loss,
            take_profit = %levels.take_profit,
            quantity = %position.quantity,
            "Bracket placed"
        );
        self.transition(
            InstrumentState::BracketActive {
                position,
                stop_loss,
                take_profit,
            },
            "bracket_placed",
        );
        Ok(())
    }

    /// Submit with retries, reusing the client order id on every attempt
    async fn submit(&self, intent: &mut OrderIntent) -> Result<OrderReport, ControllerError> {
        let exchange = self.exchange.as_ref();
        let timeout = self.request_timeout;
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let request: &OrderIntent = intent;
        let started = Instant::now();

        let result = self
            .retry
            .run(intent.kind.as_str(), move |attempt| {
                counter.store(attempt, Ordering::Relaxed);
                bounded(timeout, exchange.submit_order(request))
            })
            .await;

        telemetry::record_latency(LatencyMetric::OrderSubmission, &self.instrument, started.elapsed());
        intent.attempts = attempts.load(Ordering::Relaxed);

        match result {
            Ok(report) => {
                intent.acknowledge(&report);
                telemetry::increment(
                    CounterMetric::OrderSubmitted,
                    &self.instrument,
                    intent.kind.as_str(),
                );
                Ok(report)
            }
            Err(e) => {
                intent.status = OrderStatus::Failed;
                let error = ControllerError::from_submission(intent.kind, e);
                tracing::error!(
                    instrument = %self.instrument,
                    kind = %intent.kind,
                    client_order_id = %intent.client_order_id,
                    attempts = intent.attempts,
                    error = %error,
                    "Order submission failed"
                );
                telemetry::increment(CounterMetric::OrderFailure, &self.instrument, error.kind());
                Err(error)
            }
        }
    }
}
