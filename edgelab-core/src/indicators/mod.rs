//! Indicators precomputed once per run and consumed by the risk layer.
//!
//! The sizer and stop manager take indicator values as inputs; they never
//! recompute them bar-by-bar.

pub mod atr;
pub mod sma;

pub use atr::{atr, true_range};
pub use sma::sma;
