//! Candle storage module
//!
//! Closed price/volume bars and the rolling window they are kept in

mod store;
mod types;

pub use store::CandleStore;
pub use types::{Candle, CandleError};
