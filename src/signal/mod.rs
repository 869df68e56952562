//! Signal generation module
//!
//! Detects abnormal traded volume on the latest closed bar

mod detector;
mod types;

pub use detector::SignalDetector;
pub use types::{Direction, Signal};
