//! Risk management module
//!
//! Entry sizing and bracket price levels

mod bracket;
mod sizing;

pub use bracket::{BracketLevels, BracketSpec};
pub use sizing::PositionSizer;
