//! Order controller module
//!
//! Per-instrument entry / bracket / cleanup state machine with bounded retries

mod error;
mod order_controller;
pub mod retry;
mod state;

pub use error::ControllerError;
pub use order_controller::OrderController;
pub use retry::{RetryError, RetryPolicy};
pub use state::InstrumentState;
