//! Run command implementation

use crate::config::Config;
use crate::controller::OrderController;
use crate::exchange::{Exchange, PaperExchange};
use crate::feed::{BinanceConfig, BinanceFuturesClient};
use crate::scheduler::{CycleReport, InstrumentWorker, IntervalTicker, ManualTicker, Scheduler};
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single cycle immediately and exit
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = Arc::new(BinanceFuturesClient::with_config(BinanceConfig {
            base_url: config.feed.base_url.clone(),
            timeout: config.execution.request_timeout(),
        })?);
        let exchange: Arc<dyn Exchange> = Arc::new(PaperExchange::new(
            client.clone(),
            config.execution.initial_balance,
        ));

        let mut workers = Vec::with_capacity(config.feed.instruments.len());
        for instrument in &config.feed.instruments {
            if let Err(e) = exchange.set_leverage(instrument, config.risk.leverage).await {
                tracing::warn!(
                    instrument = %instrument,
                    leverage = config.risk.leverage,
                    error = %e,
                    "Failed to set leverage"
                );
            }
            let controller = OrderController::new(instrument, exchange.clone(), config);
            workers.push(InstrumentWorker::new(controller, client.clone(), config)?);
        }

        tracing::info!(
            mode = ?config.execution.mode,
            instruments = ?config.feed.instruments,
            interval = %config.feed.interval,
            balance = %config.execution.initial_balance,
            "Starting trading loop"
        );

        let (reports_tx, reports_rx) = mpsc::channel(64);
        let summary = tokio::spawn(log_reports(reports_rx));
        let scheduler = Scheduler::spawn(workers, Some(reports_tx));

        if self.once {
            scheduler.run(ManualTicker::once(Utc::now())).await;
            summary.await?;
            return Ok(());
        }

        let ticker = IntervalTicker::new(
            config.feed.interval_duration()?,
            Duration::from_secs(config.scheduler.settle_delay_secs),
        );
        tokio::select! {
            _ = scheduler.run(ticker) => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutdown requested");
            }
        }
        summary.abort();
        Ok(())
    }
}

async fn log_reports(mut reports: mpsc::Receiver<CycleReport>) {
    while let Some(report) = reports.recv().await {
        tracing::info!(
            instrument = %report.instrument,
            tick = %report.tick,
            direction = report.signal.map(|s| s.direction.as_str()).unwrap_or("-"),
            zscore = report.signal.map(|s| s.zscore),
            state = report.state,
            error_kind = report.error_kind,
            duration_ms = report.duration.as_millis() as u64,
            "Cycle complete"
        );
    }
}
