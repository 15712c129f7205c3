//! Performance report — the serialized result of one backtest.
//!
//! Field names are the wire contract: downstream tooling parses the JSON
//! by name, so renames are breaking changes. Metrics that could not be
//! computed serialize as null, never as 0.0.

use serde::{Deserialize, Serialize};

use edgelab_core::domain::{equity_values, EquityPoint, Trade};
use edgelab_core::drawdown;
use edgelab_core::engine::RunOutput;

use crate::metrics;

/// Aggregate performance report for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_return: f64,
    pub annualized_return: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub omega_ratio: Option<f64>,
    /// Negative fraction; 0.0 means the curve never fell below its peak.
    pub max_drawdown: f64,
    /// Mean drawdown episode length in bars.
    pub avg_drawdown_duration: f64,
    /// Longest drawdown episode length in bars.
    pub max_drawdown_duration: usize,
    pub ulcer_index: f64,
    pub pain_index: f64,
    pub pain_ratio: Option<f64>,
    pub profit_factor: Option<f64>,
    pub win_rate: Option<f64>,
    pub volatility: Option<f64>,
    pub downside_volatility: Option<f64>,
    pub total_trades: usize,
    pub avg_win: Option<f64>,
    pub avg_loss: Option<f64>,
    pub avg_holding_bars: Option<f64>,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub skipped_signals: usize,
    pub vetoed_entries: usize,
    pub skipped_bars: usize,
    pub final_equity: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades_list: Vec<Trade>,
}

impl PerformanceReport {
    /// Compute the full report at a zero risk-free rate, annualized for
    /// daily bars.
    pub fn compute(output: &RunOutput) -> Self {
        Self::compute_with(output, 0.0, metrics::PERIODS_PER_YEAR)
    }

    /// Compute the full report against an annual risk-free rate and bar
    /// frequency. The rate feeds the Sharpe and Sortino hurdles.
    ///
    /// Pure: same output for the same run, byte for byte once serialized.
    pub fn compute_with(output: &RunOutput, risk_free_rate: f64, periods_per_year: f64) -> Self {
        let equity = equity_values(&output.equity_curve);
        let returns = metrics::bar_returns(&equity);
        let drawdowns = drawdown::drawdown_series_values(&equity);
        let episodes = drawdown::analyze(&output.equity_curve);
        let trades = &output.trades;

        Self {
            total_return: metrics::total_return(&equity),
            annualized_return: metrics::annualized_return(&equity, periods_per_year),
            sharpe_ratio: metrics::sharpe_ratio(&returns, risk_free_rate, periods_per_year),
            sortino_ratio: metrics::sortino_ratio(&returns, risk_free_rate, periods_per_year),
            calmar_ratio: metrics::calmar_ratio(&equity, periods_per_year),
            omega_ratio: metrics::omega_ratio(&returns),
            max_drawdown: metrics::max_drawdown(&equity),
            avg_drawdown_duration: drawdown::avg_duration_bars(&episodes),
            max_drawdown_duration: drawdown::max_duration_bars(&episodes),
            ulcer_index: metrics::ulcer_index(&drawdowns),
            pain_index: metrics::pain_index(&drawdowns),
            pain_ratio: metrics::pain_ratio(&equity, periods_per_year),
            profit_factor: metrics::profit_factor(trades),
            win_rate: metrics::win_rate(trades),
            volatility: metrics::volatility(&returns, periods_per_year),
            downside_volatility: metrics::downside_volatility(&returns, periods_per_year),
            total_trades: trades.len(),
            avg_win: metrics::avg_win(trades),
            avg_loss: metrics::avg_loss(trades),
            avg_holding_bars: metrics::avg_holding_bars(trades),
            max_consecutive_wins: metrics::max_consecutive_wins(trades),
            max_consecutive_losses: metrics::max_consecutive_losses(trades),
            skipped_signals: output.skipped_signals,
            vetoed_entries: output.vetoed_entries,
            skipped_bars: output.skipped_bars,
            final_equity: output.final_equity,
            equity_curve: output.equity_curve.clone(),
            trades_list: output.trades.clone(),
        }
    }

    /// Serialize to pretty JSON. Struct field order is fixed, so identical
    /// reports produce identical bytes.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
