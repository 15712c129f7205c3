//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity values and/or trade ledger in,
//! value out. Metrics whose formula degenerates on the given inputs (zero
//! variance, no losing trades, empty ledger) return `None` rather than a
//! sentinel number; reports serialize `None` as JSON null so a missing
//! value can never be mistaken for a real zero.

use edgelab_core::domain::Trade;
use edgelab_core::drawdown;

/// Default bars per year for annualization: daily bars.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Per-bar simple returns from an equity series.
pub fn bar_returns(equity: &[f64]) -> Vec<f64> {
    if equity.len() < 2 {
        return Vec::new();
    }
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Total return as a fraction: (final − initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&final_eq)) if initial > 0.0 && equity.len() >= 2 => {
            (final_eq - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth rate. None for fewer than 2 bars or
/// non-positive endpoints (the geometric formula is undefined there).
pub fn annualized_return(equity: &[f64], periods_per_year: f64) -> Option<f64> {
    if equity.len() < 2 {
        return None;
    }
    let initial = equity[0];
    let final_eq = *equity.last()?;
    if initial <= 0.0 || final_eq <= 0.0 {
        return None;
    }
    let years = (equity.len() - 1) as f64 / periods_per_year;
    Some((final_eq / initial).powf(1.0 / years) - 1.0)
}

/// Annualized volatility: sample std of bar returns × √periods.
pub fn volatility(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    Some(std_dev(returns) * periods_per_year.sqrt())
}

/// Annualized downside volatility.
///
/// Zero-filled convention: positive returns contribute 0 to the sum, and
/// the divisor is the full return count, not just the down bars.
pub fn downside_volatility(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let sum_sq: f64 = returns.iter().map(|r| r.min(0.0).powi(2)).sum();
    Some((sum_sq / returns.len() as f64).sqrt() * periods_per_year.sqrt())
}

/// Annualized Sharpe ratio against an annual risk-free rate, de-annualized
/// to a per-bar hurdle. None when return variance is zero (the ratio is
/// undefined, not infinite).
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return None;
    }
    let rf_bar = risk_free_rate / periods_per_year;
    Some((mean(returns) - rf_bar) / std * periods_per_year.sqrt())
}

/// Annualized Sortino ratio with the per-bar risk-free hurdle as the
/// target. Downside deviation is measured against the same hurdle, so at
/// a zero rate it reduces to the zero-target form. None when there is no
/// downside deviation to divide by.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let rf_bar = risk_free_rate / periods_per_year;
    let sum_sq: f64 = returns.iter().map(|r| (r - rf_bar).min(0.0).powi(2)).sum();
    let downside = (sum_sq / returns.len() as f64).sqrt();
    if downside < 1e-15 {
        return None;
    }
    Some((mean(returns) - rf_bar) / downside * periods_per_year.sqrt())
}

/// Calmar ratio: annualized return / |max drawdown|. None when the curve
/// never drew down or the annualized return is undefined.
pub fn calmar_ratio(equity: &[f64], periods_per_year: f64) -> Option<f64> {
    let ann = annualized_return(equity, periods_per_year)?;
    let dd = max_drawdown(equity);
    if dd >= 0.0 {
        return None;
    }
    Some(ann / dd.abs())
}

/// Omega ratio at a zero threshold: Σ gains / Σ |losses| over bar returns.
/// None when there are no losing bars.
pub fn omega_ratio(returns: &[f64]) -> Option<f64> {
    let gains: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r.abs()).sum();
    if losses < 1e-15 {
        return None;
    }
    Some(gains / losses)
}

/// Maximum drawdown as a negative fraction (0.0 for a curve that never
/// falls below its running peak).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Ulcer index: root-mean-square of the pointwise drawdown series.
/// Penalizes deep and long drawdowns quadratically.
pub fn ulcer_index(drawdowns: &[f64]) -> f64 {
    if drawdowns.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = drawdowns.iter().map(|d| d * d).sum();
    (sum_sq / drawdowns.len() as f64).sqrt()
}

/// Pain index: mean absolute pointwise drawdown.
pub fn pain_index(drawdowns: &[f64]) -> f64 {
    if drawdowns.is_empty() {
        return 0.0;
    }
    drawdowns.iter().map(|d| d.abs()).sum::<f64>() / drawdowns.len() as f64
}

/// Pain ratio: annualized return / pain index. None when the curve never
/// drew down or the annualized return is undefined.
pub fn pain_ratio(equity: &[f64], periods_per_year: f64) -> Option<f64> {
    let ann = annualized_return(equity, periods_per_year)?;
    let pain = pain_index(&drawdown::drawdown_series_values(equity));
    if pain < 1e-15 {
        return None;
    }
    Some(ann / pain)
}

/// Fraction of closed trades that won. None for an empty ledger.
pub fn win_rate(trades: &[Trade]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    Some(winners as f64 / trades.len() as f64)
}

/// Gross profits / gross losses. None when there are no losing trades
/// (the ratio is undefined, not infinite) or the ledger is empty.
pub fn profit_factor(trades: &[Trade]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.profit_loss > 0.0)
        .map(|t| t.profit_loss)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.profit_loss < 0.0)
        .map(|t| t.profit_loss.abs())
        .sum();
    if gross_loss < 1e-10 {
        return None;
    }
    Some(gross_profit / gross_loss)
}

/// Mean profit of winning trades. None when no trade won.
pub fn avg_win(trades: &[Trade]) -> Option<f64> {
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.profit_loss > 0.0)
        .map(|t| t.profit_loss)
        .collect();
    if wins.is_empty() {
        return None;
    }
    Some(wins.iter().sum::<f64>() / wins.len() as f64)
}

/// Mean loss of losing trades (negative). None when no trade lost.
pub fn avg_loss(trades: &[Trade]) -> Option<f64> {
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.profit_loss < 0.0)
        .map(|t| t.profit_loss)
        .collect();
    if losses.is_empty() {
        return None;
    }
    Some(losses.iter().sum::<f64>() / losses.len() as f64)
}

/// Mean holding period in bars. None for an empty ledger.
pub fn avg_holding_bars(trades: &[Trade]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    Some(trades.iter().map(|t| t.bars_held).sum::<usize>() as f64 / trades.len() as f64)
}

/// Longest run of winning trades.
pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    max_consecutive(trades, true)
}

/// Longest run of losing trades.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    max_consecutive(trades, false)
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
