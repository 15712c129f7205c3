//! EdgeLab Core — trade simulator, risk sizing, stops, governor, drawdown analysis.
//!
//! This crate contains the heart of the backtesting engine:
//! - Domain types (bars, signals, positions, trades, equity points)
//! - Bar-by-bar simulation loop with a fixed temporal order per bar
//! - Position sizing (fixed-risk, volatility, Kelly)
//! - Stop-loss / exit management with ratchet invariant
//! - Risk governor with drawdown throttle and circuit breaker
//! - Drawdown episode decomposition
//!
//! Everything here is deterministic: a run's output is a pure function of
//! its inputs, and the incremental governor state always matches a
//! from-scratch recomputation.

pub mod config;
pub mod domain;
pub mod drawdown;
pub mod engine;
pub mod governor;
pub mod indicators;
pub mod sizing;
pub mod stops;
pub mod strategy;
