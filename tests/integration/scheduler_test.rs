//! Integration tests for tick fan-out and per-instrument workers

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use volspike::candle::Candle;
use volspike::config::Config;
use volspike::controller::OrderController;
use volspike::exchange::{Exchange, PaperExchange, PositionSide, Precision};
use volspike::feed::{CandleFeed, InMemoryMarket};
use volspike::scheduler::{CycleReport, InstrumentWorker, ManualTicker, Scheduler};
use volspike::signal::Direction;

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

fn tick(index: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + index * 900, 0).unwrap()
}

fn config(instruments: &[&str]) -> Config {
    let mut config = Config::default();
    config.feed.instruments = instruments.iter().map(|s| s.to_string()).collect();
    config.signal.window = 6;
    config.risk.leverage = 1;
    config
}

fn seed(market: &InMemoryMarket, instrument: &str, price: Decimal) {
    market.set_precision(instrument, Precision::new(2, 1));
    for i in 0..5 {
        let volume = if i % 2 == 0 { dec!(100) } else { dec!(120) };
        market.push_candle(instrument, bar(i, volume, price, price));
    }
}

fn workers(
    exchange: &Arc<PaperExchange>,
    feed: Arc<dyn CandleFeed>,
    config: &Config,
) -> Vec<InstrumentWorker> {
    config
        .feed
        .instruments
        .iter()
        .map(|instrument| {
            let controller = OrderController::new(instrument, exchange.clone(), config);
            InstrumentWorker::new(controller, feed.clone(), config).unwrap()
        })
        .collect()
}

async fn collect(
    reports: &mut mpsc::Receiver<CycleReport>,
    count: usize,
) -> HashMap<String, CycleReport> {
    let mut by_instrument = HashMap::new();
    for _ in 0..count {
        let report = reports.recv().await.unwrap();
        by_instrument.insert(report.instrument.clone(), report);
    }
    by_instrument
}

#[tokio::test]
async fn test_manual_ticks_drive_each_instrument_independently() {
    let market = Arc::new(InMemoryMarket::new());
    seed(&market, "SUIUSDT", dec!(2));
    seed(&market, "ETHUSDT", dec!(100));
    let exchange = Arc::new(PaperExchange::new(market.clone(), dec!(1000)));
    let config = config(&["SUIUSDT", "ETHUSDT"]);

    let (reports_tx, mut reports) = mpsc::channel(16);
    let scheduler = Scheduler::spawn(
        workers(&exchange, market.clone(), &config),
        Some(reports_tx),
    );
    let (ticks, ticker) = ManualTicker::channel(4);
    let run = tokio::spawn(scheduler.run(ticker));

    // Spike on SUI only
    market.push_candle("SUIUSDT", bar(5, dec!(900), dec!(1.95), dec!(2)));
    market.push_candle("ETHUSDT", bar(5, dec!(110), dec!(100), dec!(100)));
    ticks.send(tick(6)).await.unwrap();

    let first = collect(&mut reports, 2).await;
    let sui = &first["SUIUSDT"];
    assert_eq!(sui.signal.map(|s| s.direction), Some(Direction::Buy));
    assert_eq!(sui.state, "BRACKET_ACTIVE");
    let eth = &first["ETHUSDT"];
    assert_eq!(eth.signal.map(|s| s.direction), Some(Direction::None));
    assert_eq!(eth.state, "FLAT");

    // Same bars again: nothing new to evaluate, position stays protected
    ticks.send(tick(7)).await.unwrap();
    let second = collect(&mut reports, 2).await;
    assert!(second["SUIUSDT"].signal.is_none());
    assert_eq!(second["SUIUSDT"].state, "BRACKET_ACTIVE");

    drop(ticks);
    run.await.unwrap();

    let position = exchange.position("SUIUSDT").await.unwrap();
    assert_eq!(position.side, PositionSide::Long);
    assert!(!exchange.position("ETHUSDT").await.unwrap().is_open());
}

/// Feed that parks inside the fetch until released
struct GatedFeed {
    inner: Arc<InMemoryMarket>,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl CandleFeed for GatedFeed {
    async fn closed_candles(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Candle>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.closed_candles(instrument, interval, limit).await
    }
}

#[tokio::test]
async fn test_busy_worker_misses_tick() {
    let market = Arc::new(InMemoryMarket::new());
    seed(&market, "SUIUSDT", dec!(2));
    market.set_mark_price("SUIUSDT", dec!(2));
    let exchange = Arc::new(PaperExchange::new(market.clone(), dec!(1000)));
    let config = config(&["SUIUSDT"]);
    let feed = Arc::new(GatedFeed {
        inner: market.clone(),
        entered: Notify::new(),
        release: Notify::new(),
    });

    let (reports_tx, mut reports) = mpsc::channel(16);
    let scheduler = Scheduler::spawn(
        workers(&exchange, feed.clone(), &config),
        Some(reports_tx),
    );

    assert_eq!(scheduler.dispatch(tick(6)), 1);
    feed.entered.notified().await;

    // Worker is mid-cycle on the first tick
    assert_eq!(scheduler.dispatch(tick(7)), 0);

    feed.release.notify_one();
    let report = reports.recv().await.unwrap();
    assert_eq!(report.tick, tick(6));
    assert!(!report.timed_out);

    scheduler.shutdown().await;
    assert!(reports.recv().await.is_none());
}
