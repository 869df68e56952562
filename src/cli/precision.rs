//! Precision command implementation

use crate::config::Config;
use crate::feed::{BinanceConfig, BinanceFuturesClient, MarketData};
use clap::Args;

#[derive(Args, Debug)]
pub struct PrecisionArgs {
    /// Instrument symbol, e.g. SUIUSDT
    pub instrument: String,
}

impl PrecisionArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = BinanceFuturesClient::with_config(BinanceConfig {
            base_url: config.feed.base_url.clone(),
            timeout: config.execution.request_timeout(),
        })?;

        let precision = client.fetch_precision(&self.instrument).await?;
        let mark = client.mark_price(&self.instrument).await?;

        println!("{}", self.instrument.to_uppercase());
        println!("  Price precision:    {}", precision.price_precision);
        println!("  Quantity precision: {}", precision.quantity_precision);
        println!("  Mark price:         {}", precision.round_price(mark));
        Ok(())
    }
}
