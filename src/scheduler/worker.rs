//! Per-instrument worker
//!
//! Owns one instrument's candle window and order controller. Each tick it
//! refreshes candles, classifies the newest bar, and hands the signal to the
//! controller, all under a deadline of one bar interval.
//!
//! The controller pass runs in its own task holding the controller lock. A
//! cycle abandoned at the deadline stops waiting for it but never cancels it,
//! so a submission already on the wire still completes. The next cycle waits
//! for the lock and rebuilds from exchange state before acting.

use crate::candle::{CandleError, CandleStore};
use crate::config::Config;
use crate::controller::OrderController;
use crate::feed::CandleFeed;
use crate::signal::{Signal, SignalDetector};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, MutexGuard};

/// Outcome of one worker cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub instrument: String,
    pub tick: DateTime<Utc>,
    /// Classification of a newly closed bar, if one was evaluated
    pub signal: Option<Signal>,
    /// Controller state after the cycle, or the last known one if the
    /// controller pass outlived the deadline
    pub state: &'static str,
    pub error_kind: Option<&'static str>,
    pub timed_out: bool,
    pub duration: Duration,
}

/// Drives one instrument through fetch, detect, and order control
pub struct InstrumentWorker {
    instrument: String,
    interval: String,
    feed: Arc<dyn CandleFeed>,
    store: CandleStore,
    detector: SignalDetector,
    controller: Arc<Mutex<OrderController>>,
    /// An abandoned controller pass still held the lock at the deadline
    rebuild_pending: bool,
    last_state: &'static str,
    cycle_budget: Duration,
    /// Open time of the last bar handed to the controller
    last_evaluated: Option<DateTime<Utc>>,
    busy: Arc<AtomicBool>,
}

impl InstrumentWorker {
    pub fn new(
        controller: OrderController,
        feed: Arc<dyn CandleFeed>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            instrument: controller.instrument().to_string(),
            interval: config.feed.interval.clone(),
            feed,
            store: CandleStore::new(config.signal.window),
            detector: SignalDetector::from_config(&config.signal),
            last_state: controller.state().name(),
            controller: Arc::new(Mutex::new(controller)),
            rebuild_pending: false,
            cycle_budget: config.feed.interval_duration()?,
            last_evaluated: None,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Override the per-cycle deadline
    pub fn with_cycle_budget(mut self, budget: Duration) -> Self {
        self.cycle_budget = budget;
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Lock the controller, waiting out any pass still in flight
    pub async fn controller(&self) -> MutexGuard<'_, OrderController> {
        self.controller.lock().await
    }

    /// Flag raised while a cycle is in flight
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        self.busy.clone()
    }

    /// Process ticks until the channel closes
    pub async fn run(
        mut self,
        mut ticks: mpsc::Receiver<DateTime<Utc>>,
        reports: Option<mpsc::Sender<CycleReport>>,
    ) {
        tracing::info!(instrument = %self.instrument, "Worker started");

        while let Some(tick) = ticks.recv().await {
            let report = self.run_cycle(tick).await;
            if let Some(reports) = &reports {
                if reports.send(report).await.is_err() {
                    tracing::debug!(instrument = %self.instrument, "Report receiver dropped");
                }
            }
        }

        let controller = self.controller.lock().await;
        tracing::info!(
            instrument = %self.instrument,
            state = controller.state().name(),
            "Worker stopped"
        );
    }

    /// One bounded cycle. Errors are logged and counted here and never
    /// escape the worker.
    pub async fn run_cycle(&mut self, tick: DateTime<Utc>) -> CycleReport {
        self.busy.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let budget = self.cycle_budget;

        let outcome = tokio::time::timeout(budget, self.cycle(tick)).await;
        let duration = started.elapsed();
        telemetry::record_latency(LatencyMetric::Cycle, &self.instrument, duration);

        let mut report = CycleReport {
            instrument: self.instrument.clone(),
            tick,
            signal: None,
            state: self.last_state,
            error_kind: None,
            timed_out: false,
            duration,
        };

        match outcome {
            Ok((signal, error_kind)) => {
                report.signal = signal;
                report.error_kind = error_kind;
            }
            Err(_) => {
                match self.controller.try_lock() {
                    Ok(mut controller) => controller.mark_uncertain(),
                    Err(_) => self.rebuild_pending = true,
                }
                tracing::warn!(
                    instrument = %self.instrument,
                    state = report.state,
                    error_kind = "cycle_timeout",
                    budget_ms = budget.as_millis() as u64,
                    in_flight = self.rebuild_pending,
                    "Cycle abandoned at deadline, state will be rebuilt from the exchange"
                );
                telemetry::increment(CounterMetric::CycleTimeout, &self.instrument, "timeout");
                report.timed_out = true;
                report.error_kind = Some("cycle_timeout");
            }
        }

        self.busy.store(false, Ordering::SeqCst);
        report
    }

    async fn cycle(&mut self, tick: DateTime<Utc>) -> (Option<Signal>, Option<&'static str>) {
        if let Err(e) = self.refresh().await {
            // The controller still reconciles; exits must not wait on data
            tracing::error!(
                instrument = %self.instrument,
                state = self.last_state,
                error_kind = "candle_fetch",
                error = %e,
                "Candle refresh failed"
            );
            telemetry::increment(CounterMetric::CycleError, &self.instrument, "candle_fetch");
        }

        let signal = self.evaluate();
        let action = signal.unwrap_or_else(|| Signal::none(tick, 0.0));

        let mut controller = self.controller.clone().lock_owned().await;
        if std::mem::take(&mut self.rebuild_pending) {
            controller.mark_uncertain();
        }
        let pass = tokio::spawn(async move {
            let result = controller.on_cycle(&action).await;
            (controller.state().name(), result.err())
        });

        let error_kind = match pass.await {
            Ok((state, error)) => {
                self.last_state = state;
                error.map(|e| {
                    tracing::error!(
                        instrument = %self.instrument,
                        state,
                        error_kind = e.kind(),
                        error = %e,
                        "Cycle failed"
                    );
                    telemetry::increment(CounterMetric::CycleError, &self.instrument, e.kind());
                    e.kind()
                })
            }
            Err(e) => {
                tracing::error!(
                    instrument = %self.instrument,
                    state = self.last_state,
                    error_kind = "controller_panic",
                    error = %e,
                    "Controller pass aborted"
                );
                telemetry::increment(
                    CounterMetric::CycleError,
                    &self.instrument,
                    "controller_panic",
                );
                self.rebuild_pending = true;
                Some("controller_panic")
            }
        };
        (signal, error_kind)
    }

    async fn refresh(&mut self) -> anyhow::Result<()> {
        let started = Instant::now();
        let candles = self
            .feed
            .closed_candles(&self.instrument, &self.interval, self.store.capacity())
            .await?;
        telemetry::record_latency(LatencyMetric::CandleFetch, &self.instrument, started.elapsed());

        let added = self.store.extend_closed(candles);
        tracing::debug!(
            instrument = %self.instrument,
            added,
            held = self.store.len(),
            "Candle window refreshed"
        );
        Ok(())
    }

    /// Classify the newest bar of a full window, once per bar
    fn evaluate(&mut self) -> Option<Signal> {
        let latest = self.store.latest()?.open_time;
        if self.last_evaluated == Some(latest) {
            tracing::debug!(instrument = %self.instrument, bar = %latest, "No new bar");
            return None;
        }

        let signal = match self
            .store
            .recent(self.store.capacity())
            .and_then(|window| self.detector.detect(&window))
        {
            Ok(signal) => signal,
            Err(CandleError::InsufficientData {
                required,
                available,
            }) => {
                tracing::info!(
                    instrument = %self.instrument,
                    required,
                    available,
                    "Warming up candle window"
                );
                return None;
            }
        };
        self.last_evaluated = Some(latest);

        if signal.direction.is_actionable() {
            tracing::info!(
                instrument = %self.instrument,
                direction = %signal.direction,
                zscore = signal.zscore,
                bar = %signal.timestamp,
                "Volume spike"
            );
            telemetry::increment(
                CounterMetric::Signal,
                &self.instrument,
                signal.direction.as_str(),
            );
        } else {
            tracing::debug!(
                instrument = %self.instrument,
                zscore = signal.zscore,
                "No spike"
            );
        }
        Some(signal)
    }
}
