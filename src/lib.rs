//! volspike: volume-spike trading bot for USDⓈ-M perpetual futures
//!
//! This library provides the core components for:
//! - Closed-candle windows fed from Binance public market data
//! - Rolling volume Z-score signal detection
//! - Per-instrument order lifecycle with stop-loss / take-profit brackets
//! - Bounded retries with idempotent client order ids
//! - Position sizing and bracket levels at exchange precision
//! - Paper exchange with simulated fills
//! - Bar-aligned scheduling across instruments
//! - Structured logging and Prometheus metrics

pub mod candle;
pub mod cli;
pub mod config;
pub mod controller;
pub mod exchange;
pub mod feed;
pub mod precision;
pub mod risk;
pub mod scheduler;
pub mod signal;
pub mod telemetry;
