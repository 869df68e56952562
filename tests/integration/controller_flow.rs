//! Integration tests for the signal → order lifecycle path

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use volspike::candle::{Candle, CandleStore};
use volspike::config::Config;
use volspike::controller::{ControllerError, InstrumentState, OrderController, RetryPolicy};
use volspike::exchange::{
    Exchange, ExchangeError, OrderIntent, OrderKind, OrderReport, PaperExchange, Position,
    PositionSide, Precision,
};
use volspike::feed::InMemoryMarket;
use volspike::signal::{Direction, Signal, SignalDetector};

const SYMBOL: &str = "SUIUSDT";

fn bar(index: i64, volume: Decimal, open: Decimal, close: Decimal) -> Candle {
    let open_time = Utc.timestamp_opt(1_700_000_000 + index * 900, 0).unwrap();
    Candle {
        open_time,
        close_time: open_time + ChronoDuration::seconds(899),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume,
        taker_buy_volume: None,
    }
}

/// Alternating 100/120 volumes, then one bar of `spike` volume
fn spike_window(spike: Decimal, open: Decimal, close: Decimal) -> Vec<Candle> {
    let mut store = CandleStore::new(20);
    for i in 0..19 {
        let volume = if i % 2 == 0 { dec!(100) } else { dec!(120) };
        store.append(bar(i, volume, dec!(100), dec!(100)));
    }
    store.append(bar(19, spike, open, close));
    store.window()
}

fn config() -> Config {
    let mut config = Config::default();
    config.risk.risk_fraction = dec!(0.98);
    config.risk.leverage = 1;
    config.risk.stop_loss_pct = dec!(0.02);
    config.risk.take_profit_pct = dec!(0.04);
    config
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10))
}

fn setup(mark: Decimal) -> (Arc<InMemoryMarket>, Arc<PaperExchange>) {
    let market = Arc::new(InMemoryMarket::new());
    market.set_mark_price(SYMBOL, mark);
    market.set_precision(SYMBOL, Precision::new(2, 1));
    let exchange = Arc::new(PaperExchange::new(market.clone(), dec!(1000)).with_fee_rate(dec!(0)));
    (market, exchange)
}

fn quiet() -> Signal {
    Signal::none(Utc::now(), 0.0)
}

/// Exchange whose order submissions always fail the same way
struct FailingSubmits {
    inner: Arc<PaperExchange>,
    error: ExchangeError,
    submits: AtomicU32,
}

#[async_trait]
impl Exchange for FailingSubmits {
    async fn submit_order(&self, _: &OrderIntent) -> Result<OrderReport, ExchangeError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
    async fn cancel_order(&self, instrument: &str, order_id: &str) -> Result<(), ExchangeError> {
        self.inner.cancel_order(instrument, order_id).await
    }
    async fn cancel_all_orders(&self, instrument: &str) -> Result<(), ExchangeError> {
        self.inner.cancel_all_orders(instrument).await
    }
    async fn order_status(
        &self,
        instrument: &str,
        order_id: &str,
    ) -> Result<OrderReport, ExchangeError> {
        self.inner.order_status(instrument, order_id).await
    }
    async fn open_orders(&self, instrument: &str) -> Result<Vec<OrderReport>, ExchangeError> {
        self.inner.open_orders(instrument).await
    }
    async fn position(&self, instrument: &str) -> Result<Position, ExchangeError> {
        self.inner.position(instrument).await
    }
    async fn balance(&self) -> Result<Decimal, ExchangeError> {
        self.inner.balance().await
    }
    async fn mark_price(&self, instrument: &str) -> Result<Decimal, ExchangeError> {
        self.inner.mark_price(instrument).await
    }
    async fn precision(&self, instrument: &str) -> Result<Precision, ExchangeError> {
        self.inner.precision(instrument).await
    }
    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.inner.set_leverage(instrument, leverage).await
    }
}

#[tokio::test]
async fn test_green_spike_buys_with_bracket_then_stop_closes() {
    let (market, exchange) = setup(dec!(100));
    let mut controller =
        OrderController::new(SYMBOL, exchange.clone(), &config()).with_retry_policy(fast_retry());

    let signal = SignalDetector::new(2.0)
        .detect(&spike_window(dec!(600), dec!(99), dec!(100)))
        .unwrap();
    assert_eq!(signal.direction, Direction::Buy);

    controller.on_cycle(&signal).await.unwrap();
    let InstrumentState::BracketActive {
        position,
        stop_loss,
        take_profit,
    } = controller.state().clone()
    else {
        panic!("expected bracket, got {:?}", controller.state());
    };
    assert_eq!(position.entry_price, dec!(100));
    assert_eq!(stop_loss.kind, OrderKind::StopLoss);
    assert_eq!(stop_loss.trigger_price, Some(dec!(98.00)));
    assert_eq!(take_profit.trigger_price, Some(dec!(104.00)));

    // Stop-loss trips; the next cycle sees it and clears the take-profit
    market.set_mark_price(SYMBOL, dec!(97.5));
    controller.on_cycle(&quiet()).await.unwrap();

    assert!(controller.state().is_flat());
    assert!(exchange.open_orders(SYMBOL).await.unwrap().is_empty());
    // 9.8 contracts lost 2.5 each
    assert_eq!(exchange.balance().await.unwrap(), dec!(975.5));
}

#[tokio::test]
async fn test_red_spike_sells_and_take_profit_closes() {
    let (market, exchange) = setup(dec!(100));
    let mut controller =
        OrderController::new(SYMBOL, exchange.clone(), &config()).with_retry_policy(fast_retry());

    let signal = SignalDetector::new(2.0)
        .detect(&spike_window(dec!(600), dec!(101), dec!(100)))
        .unwrap();
    assert_eq!(signal.direction, Direction::Sell);

    controller.on_cycle(&signal).await.unwrap();
    let position = exchange.position(SYMBOL).await.unwrap();
    assert_eq!(position.side, PositionSide::Short);

    market.set_mark_price(SYMBOL, dec!(95));
    controller.on_cycle(&quiet()).await.unwrap();

    assert!(controller.state().is_flat());
    assert!(exchange.balance().await.unwrap() > dec!(1000));
}

#[tokio::test]
async fn test_no_stacking_while_position_open() {
    let (_, exchange) = setup(dec!(100));
    let mut controller =
        OrderController::new(SYMBOL, exchange.clone(), &config()).with_retry_policy(fast_retry());
    let buy = Signal {
        timestamp: Utc::now(),
        direction: Direction::Buy,
        zscore: 4.2,
    };

    for _ in 0..4 {
        controller.on_cycle(&buy).await.unwrap();
    }

    let position = exchange.position(SYMBOL).await.unwrap();
    assert_eq!(position.quantity, dec!(9.8));
    assert_eq!(exchange.open_orders(SYMBOL).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_three_failed_submissions_stop_and_stay_flat() {
    let (_, paper) = setup(dec!(100));
    let exchange = Arc::new(FailingSubmits {
        inner: paper.clone(),
        error: ExchangeError::Transport("connection reset by peer".into()),
        submits: AtomicU32::new(0),
    });
    let mut controller =
        OrderController::new(SYMBOL, exchange.clone(), &config()).with_retry_policy(fast_retry());
    let buy = Signal {
        timestamp: Utc::now(),
        direction: Direction::Buy,
        zscore: 3.1,
    };

    let err = controller.on_cycle(&buy).await.unwrap_err();

    assert!(matches!(
        err,
        ControllerError::Submission {
            kind: OrderKind::Market,
            attempts: 3,
            ..
        }
    ));
    assert_eq!(exchange.submits.load(Ordering::SeqCst), 3);
    assert!(controller.state().is_flat());
    assert!(!paper.position(SYMBOL).await.unwrap().is_open());
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let (_, paper) = setup(dec!(100));
    let exchange = Arc::new(FailingSubmits {
        inner: paper,
        error: ExchangeError::rejected(-2019, "Margin is insufficient."),
        submits: AtomicU32::new(0),
    });
    let mut controller =
        OrderController::new(SYMBOL, exchange.clone(), &config()).with_retry_policy(fast_retry());
    let sell = Signal {
        timestamp: Utc::now(),
        direction: Direction::Sell,
        zscore: 2.5,
    };

    let err = controller.on_cycle(&sell).await.unwrap_err();

    assert_eq!(err.kind(), "exchange_rejection");
    assert_eq!(exchange.submits.load(Ordering::SeqCst), 1);
    assert!(controller.state().is_flat());
}

#[tokio::test]
async fn test_manual_close_detected() {
    let (_, exchange) = setup(dec!(100));
    let mut controller =
        OrderController::new(SYMBOL, exchange.clone(), &config()).with_retry_policy(fast_retry());
    controller
        .on_cycle(&Signal {
            timestamp: Utc::now(),
            direction: Direction::Buy,
            zscore: 3.0,
        })
        .await
        .unwrap();

    // Operator flattens the position by hand
    exchange
        .submit_order(&OrderIntent::market(
            "manual-close",
            SYMBOL,
            volspike::exchange::OrderSide::Sell,
            dec!(9.8),
        ))
        .await
        .unwrap();

    controller.on_cycle(&quiet()).await.unwrap();
    assert!(controller.state().is_flat());
    assert!(exchange.open_orders(SYMBOL).await.unwrap().is_empty());
}
