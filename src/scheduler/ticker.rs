//! Tick sources
//!
//! `IntervalTicker` fires once per bar, shortly after the bar closes.
//! `ManualTicker` replays ticks pushed through a channel.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

/// Source of scheduler ticks
#[async_trait]
pub trait TickSource: Send {
    /// Wait for the next tick; `None` ends the run
    async fn next_tick(&mut self) -> Option<DateTime<Utc>>;
}

/// First multiple of `interval` (since the epoch) strictly after `now`
pub fn next_boundary(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let step = (interval.as_millis() as i64).max(1);
    let next = (now.timestamp_millis().div_euclid(step) + 1) * step;
    Utc.timestamp_millis_opt(next).single().unwrap_or(now)
}

/// Ticks on bar boundaries plus a settle delay
#[derive(Debug, Clone)]
pub struct IntervalTicker {
    interval: Duration,
    settle: Duration,
}

impl IntervalTicker {
    pub fn new(interval: Duration, settle: Duration) -> Self {
        Self { interval, settle }
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    async fn next_tick(&mut self) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        let boundary = next_boundary(now, self.interval);
        let wait = (boundary - now).to_std().unwrap_or(Duration::ZERO) + self.settle;

        tracing::debug!(
            next_bar_close = %boundary,
            wait_ms = wait.as_millis() as u64,
            "Waiting for next bar"
        );
        tokio::time::sleep(wait).await;
        Some(boundary)
    }
}

/// Ticks injected by hand
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::Receiver<DateTime<Utc>>,
}

impl ManualTicker {
    /// Ticker plus the sender that drives it; dropping the sender ends the run
    pub fn channel(capacity: usize) -> (mpsc::Sender<DateTime<Utc>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    /// Ticker that yields `tick` once and then ends
    pub fn once(tick: DateTime<Utc>) -> Self {
        let (tx, ticker) = Self::channel(1);
        // Fresh channel with room for exactly one tick
        let _ = tx.try_send(tick);
        ticker
    }
}

#[async_trait]
impl TickSource for ManualTicker {
    async fn next_tick(&mut self) -> Option<DateTime<Utc>> {
        self.rx.recv().await
    }
}
