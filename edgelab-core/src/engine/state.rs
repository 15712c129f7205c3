//! Running state for a single simulation.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::BreakerConfig;
use crate::domain::{EquityPoint, Position, Trade};
use crate::governor::RiskGovernor;

/// Per-run knobs that sit outside the risk configuration.
#[derive(Debug, Clone, Default)]
pub struct SimOptions {
    pub initial_capital: f64,
    /// Symbol stamped onto positions; cosmetic for single-series runs.
    pub symbol: String,
    /// Hard ceiling on series length. `None` disables the check.
    pub max_bars: Option<usize>,
    /// Cooperative cancellation flag, checked once per bar.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Bars-consumed counter, bumped once per bar. Callers that spawn a
    /// run poll it against the series length.
    pub progress: Option<Arc<AtomicUsize>>,
    /// Wall-clock budget for the whole run, checked once per bar.
    /// `None` disables the check.
    pub max_duration: Option<Duration>,
}

impl SimOptions {
    pub fn new(initial_capital: f64) -> Self {
        assert!(
            initial_capital > 0.0,
            "initial_capital must be positive"
        );
        Self {
            initial_capital,
            symbol: String::new(),
            max_bars: None,
            cancel: None,
            progress: None,
            max_duration: None,
        }
    }
}

/// Everything the simulator mutates while folding over the series.
///
/// Cash and the open position together define equity at any price:
/// `equity = cash + position.market_value(price)`.
#[derive(Debug)]
pub struct SimState {
    pub cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub governor: RiskGovernor,
    pub skipped_signals: usize,
    pub vetoed_entries: usize,
    pub skipped_bars: usize,
    /// Close of the most recent sane bar; marks equity through malformed
    /// bars.
    pub last_price: f64,
    pub symbol: String,
    /// Entry-side fees of the open position, folded into the trade's total
    /// when it closes.
    pub open_fees: f64,
}

impl SimState {
    pub fn new(opts: &SimOptions, breaker: BreakerConfig) -> Self {
        Self {
            cash: opts.initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            governor: RiskGovernor::new(breaker),
            skipped_signals: 0,
            vetoed_entries: 0,
            skipped_bars: 0,
            last_price: 0.0,
            symbol: opts.symbol.clone(),
            open_fees: 0.0,
        }
    }

    /// Equity at `price`: cash plus the open position's signed value.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        match &self.position {
            Some(p) => self.cash + p.market_value(price),
            None => self.cash,
        }
    }

    /// Append one equity point and feed the governor's accumulators.
    pub fn push_equity(&mut self, timestamp: DateTime<Utc>, equity: f64) {
        let point = EquityPoint { timestamp, equity };
        self.governor.observe_equity(&point);
        self.equity_curve.push(point);
    }

    /// Overwrite the value of the last equity point. Used once, after the
    /// end-of-period liquidation re-marks final equity; the governor is not
    /// re-fed because the run is over.
    pub fn replace_last_equity(&mut self, equity: f64) {
        if let Some(point) = self.equity_curve.last_mut() {
            point.equity = equity;
        }
    }
}
