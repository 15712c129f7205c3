//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR uses Wilder smoothing (EMA with alpha = 1/period), seeded with the
//! mean of the first `period` true ranges. Values before the seed are NaN.

use crate::domain::Bar;

/// Compute the True Range series.
///
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];
    if n == 0 {
        return tr;
    }

    tr[0] = bars[0].high - bars[0].low;
    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

/// Wilder-smoothed ATR over `period` bars.
///
/// Index `t` holds the ATR known at bar `t`'s close. The first `period - 1`
/// entries are NaN (insufficient history).
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    assert!(period >= 1, "ATR period must be >= 1");
    let tr = true_range(bars);
    let n = tr.len();
    let mut out = vec![f64::NAN; n];
    if n < period {
        return out;
    }

    // Seed: simple mean of the first `period` true ranges.
    let seed: f64 = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;

    let alpha = 1.0 / period as f64;
    for i in period..n {
        out[i] = out[i - 1] + alpha * (tr[i] - out[i - 1]);
    }
    out
}
