//! Scheduler module
//!
//! Fans each tick out to one worker task per instrument. Workers run
//! independently; one slow instrument never delays another. A worker still
//! busy when the next tick arrives misses that tick.

mod ticker;
mod worker;

pub use ticker::{next_boundary, IntervalTicker, ManualTicker, TickSource};
pub use worker::{CycleReport, InstrumentWorker};

use crate::telemetry::{self, CounterMetric};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

struct WorkerHandle {
    instrument: String,
    ticks: mpsc::Sender<DateTime<Utc>>,
    busy: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Tick fan-out over spawned instrument workers
pub struct Scheduler {
    workers: Vec<WorkerHandle>,
}

impl Scheduler {
    /// Spawn one task per worker. Cycle reports go to `reports` when given.
    pub fn spawn(
        workers: Vec<InstrumentWorker>,
        reports: Option<mpsc::Sender<CycleReport>>,
    ) -> Self {
        let workers = workers
            .into_iter()
            .map(|worker| {
                let (tx, rx) = mpsc::channel(1);
                let instrument = worker.instrument().to_string();
                let busy = worker.busy_flag();
                let task = tokio::spawn(worker.run(rx, reports.clone()));
                WorkerHandle {
                    instrument,
                    ticks: tx,
                    busy,
                    task,
                }
            })
            .collect();

        Self { workers }
    }

    pub fn instruments(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.instrument.as_str()).collect()
    }

    /// Forward ticks until the source ends, then wait for in-flight cycles
    pub async fn run<T: TickSource>(self, mut ticks: T) {
        tracing::info!(instruments = ?self.instruments(), "Scheduler started");

        while let Some(tick) = ticks.next_tick().await {
            tracing::debug!(%tick, "Tick");
            self.dispatch(tick);
        }

        self.shutdown().await;
    }

    /// Hand `tick` to every idle worker; returns how many accepted it
    pub fn dispatch(&self, tick: DateTime<Utc>) -> usize {
        let mut accepted = 0;
        for worker in &self.workers {
            if worker.busy.load(Ordering::SeqCst) {
                self.missed(worker, tick);
                continue;
            }
            match worker.ticks.try_send(tick) {
                Ok(()) => accepted += 1,
                Err(TrySendError::Full(_)) => self.missed(worker, tick),
                Err(TrySendError::Closed(_)) => {
                    tracing::error!(instrument = %worker.instrument, "Worker task has exited");
                }
            }
        }
        accepted
    }

    fn missed(&self, worker: &WorkerHandle, tick: DateTime<Utc>) {
        tracing::warn!(
            instrument = %worker.instrument,
            %tick,
            "Worker still busy, tick missed"
        );
        telemetry::increment(CounterMetric::MissedTick, &worker.instrument, "busy");
    }

    /// Close tick channels and wait for every worker to finish
    pub async fn shutdown(self) {
        let tasks: Vec<(String, JoinHandle<()>)> = self
            .workers
            .into_iter()
            .map(|worker| (worker.instrument, worker.task))
            .collect();

        for (instrument, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(instrument = %instrument, error = %e, "Worker task failed");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}
