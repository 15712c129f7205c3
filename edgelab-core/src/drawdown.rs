//! Drawdown analysis — peak-to-trough episode decomposition.
//!
//! A pure transform over the completed equity curve. Episodes are always
//! rebuilt from the curve, never mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EquityPoint;

/// One peak-to-trough-to-recovery episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPeriod {
    /// Time of the peak the episode fell from.
    pub peak_time: DateTime<Utc>,
    /// Time of the maximum decline within the episode.
    pub trough_time: DateTime<Utc>,
    /// Recovery time (new high) or the end of the series for open episodes.
    pub end_time: DateTime<Utc>,
    /// Peak-to-trough decline as a negative fraction: (trough − peak) / peak.
    pub magnitude: f64,
    /// Duration from peak to end, in bars.
    pub bars: usize,
    /// False when the series ended before equity made a new high.
    pub recovered: bool,
}

/// Decompose an equity curve into drawdown episodes.
///
/// An episode opens when equity falls below the running peak and closes
/// when equity makes a new high (recovery) or the series ends. An open
/// episode at series end is still counted, with `recovered: false`.
pub fn analyze(curve: &[EquityPoint]) -> Vec<DrawdownPeriod> {
    let mut episodes = Vec::new();
    if curve.len() < 2 {
        return episodes;
    }

    let mut peak_index = 0;
    let mut peak_value = curve[0].equity;
    let mut in_episode = false;
    let mut trough_index = 0;
    let mut trough_value = f64::INFINITY;

    for (i, point) in curve.iter().enumerate().skip(1) {
        if point.equity >= peak_value {
            if in_episode {
                episodes.push(DrawdownPeriod {
                    peak_time: curve[peak_index].timestamp,
                    trough_time: curve[trough_index].timestamp,
                    end_time: point.timestamp,
                    magnitude: (trough_value - peak_value) / peak_value,
                    bars: i - peak_index,
                    recovered: true,
                });
                in_episode = false;
            }
            peak_index = i;
            peak_value = point.equity;
        } else {
            if !in_episode {
                in_episode = true;
                trough_index = i;
                trough_value = point.equity;
            } else if point.equity < trough_value {
                trough_index = i;
                trough_value = point.equity;
            }
        }
    }

    if in_episode {
        let last = curve.len() - 1;
        episodes.push(DrawdownPeriod {
            peak_time: curve[peak_index].timestamp,
            trough_time: curve[trough_index].timestamp,
            end_time: curve[last].timestamp,
            magnitude: (trough_value - peak_value) / peak_value,
            bars: last - peak_index,
            recovered: false,
        });
    }

    episodes
}

/// Maximum drawdown: the most negative episode magnitude (0.0 for a curve
/// with no episodes).
pub fn max_drawdown(episodes: &[DrawdownPeriod]) -> f64 {
    episodes
        .iter()
        .map(|e| e.magnitude)
        .fold(0.0_f64, f64::min)
}

/// Mean episode duration in bars (0.0 with no episodes).
pub fn avg_duration_bars(episodes: &[DrawdownPeriod]) -> f64 {
    if episodes.is_empty() {
        return 0.0;
    }
    episodes.iter().map(|e| e.bars).sum::<usize>() as f64 / episodes.len() as f64
}

/// Longest episode duration in bars.
pub fn max_duration_bars(episodes: &[DrawdownPeriod]) -> usize {
    episodes.iter().map(|e| e.bars).max().unwrap_or(0)
}

/// Per-point drawdown series: fraction below the running peak at each bar
/// (≤ 0.0). Used by the Ulcer and Pain indices, which integrate over the
/// whole curve rather than over episodes.
pub fn drawdown_series(curve: &[EquityPoint]) -> Vec<f64> {
    let values: Vec<f64> = curve.iter().map(|p| p.equity).collect();
    drawdown_series_values(&values)
}

/// As [`drawdown_series`], over bare equity values.
pub fn drawdown_series_values(equity: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(equity.len());
    let mut peak = f64::MIN;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        out.push(if peak > 0.0 { (value - peak) / peak } else { 0.0 });
    }
    out
}
