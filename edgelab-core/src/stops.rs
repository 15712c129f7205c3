//! Stop-loss / exit management.
//!
//! Stops are recomputed every bar from the position's trailing state, not
//! from scratch off price history. The ratchet invariant holds throughout:
//! a stop may tighten, never loosen, even when ATR expands.

use crate::config::StopMethod;
use crate::domain::{Bar, ExitReason, Position, Side};

/// A forced exit detected within a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    /// Raw fill price before slippage: the touched level, or the bar's open
    /// when the bar gapped through the level.
    pub price: f64,
    pub reason: ExitReason,
}

/// Stop/exit manager for one run. Borrows the method and the precomputed
/// ATR series; all state lives on the `Position`.
pub struct ExitManager<'a> {
    method: &'a StopMethod,
    atr: Option<&'a [f64]>,
}

impl<'a> ExitManager<'a> {
    pub fn new(method: &'a StopMethod, atr: Option<&'a [f64]>) -> Self {
        Self { method, atr }
    }

    fn atr_at(&self, index: usize) -> Option<f64> {
        let value = *self.atr?.get(index)?;
        if value.is_finite() {
            Some(value)
        } else {
            None
        }
    }

    /// Initial stop for an entry at `entry_price`.
    ///
    /// `index` is the bar the risk context is read from: the bar *before* a
    /// next-open fill, or the signal bar itself for a same-close fill.
    /// Returns None when the method's inputs are not yet available (ATR
    /// still NaN, swing window incomplete).
    pub fn initial_stop(
        &self,
        side: Side,
        entry_price: f64,
        bars: &[Bar],
        index: usize,
    ) -> Option<f64> {
        match *self.method {
            StopMethod::FixedPercent { stop_pct } | StopMethod::TrailingPercent { trail_pct: stop_pct } => {
                Some(entry_price * (1.0 - side.sign() * stop_pct))
            }
            StopMethod::Volatility { atr_multiplier, .. }
            | StopMethod::TrailingAtr { atr_multiplier, .. } => {
                let atr = self.atr_at(index)?;
                Some(entry_price - side.sign() * atr * atr_multiplier)
            }
            StopMethod::SwingLevel { lookback, buffer_pct } => {
                if index + 1 < lookback {
                    return None;
                }
                let window = &bars[index + 1 - lookback..=index];
                let level = match side {
                    Side::Long => {
                        let swing_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
                        swing_low * (1.0 - buffer_pct)
                    }
                    Side::Short => {
                        let swing_high =
                            window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
                        swing_high * (1.0 + buffer_pct)
                    }
                };
                Some(level)
            }
        }
    }

    /// Recompute the stop for an open position at bar `index`.
    ///
    /// Trailing methods propose a stop off the best favorable price seen
    /// since entry and ratchet against the current stop. Anchored methods
    /// return the existing stop unchanged.
    pub fn current_stop(&self, position: &Position, index: usize) -> f64 {
        let proposed = match *self.method {
            StopMethod::TrailingPercent { trail_pct } => {
                position.best_favorable * (1.0 - position.side.sign() * trail_pct)
            }
            StopMethod::TrailingAtr { atr_multiplier, .. } => match self.atr_at(index) {
                Some(atr) => {
                    position.best_favorable - position.side.sign() * atr * atr_multiplier
                }
                None => return position.stop_price,
            },
            _ => return position.stop_price,
        };

        // Ratchet: only ever tighten.
        match position.side {
            Side::Long => proposed.max(position.stop_price),
            Side::Short => proposed.min(position.stop_price),
        }
    }

    /// Check whether the bar touched the position's stop or target.
    ///
    /// Touch detection uses the bar's high/low, not just the close. When
    /// both levels are touched within one bar, the stop is assumed to fill
    /// first (worst case) unless the bar's open is already at or beyond one
    /// of the levels — a gap open orders the touch unambiguously. Gapped
    /// fills happen at the open, not at the level.
    pub fn check_exit(position: &Position, bar: &Bar) -> Option<ExitFill> {
        let stop = position.stop_price;
        let target = position.target_price;

        let (stop_touched, target_touched) = match position.side {
            Side::Long => (
                bar.low <= stop,
                target.is_some_and(|t| bar.high >= t),
            ),
            Side::Short => (
                bar.high >= stop,
                target.is_some_and(|t| bar.low <= t),
            ),
        };

        if !stop_touched && !target_touched {
            return None;
        }

        let stop_gapped = match position.side {
            Side::Long => bar.open <= stop,
            Side::Short => bar.open >= stop,
        };
        let target_gapped = target.is_some_and(|t| match position.side {
            Side::Long => bar.open >= t,
            Side::Short => bar.open <= t,
        });

        if stop_touched && target_touched {
            // Gap open beyond exactly one level fixes the order; otherwise
            // worst case: stop first.
            if target_gapped && !stop_gapped {
                return Some(ExitFill {
                    price: bar.open,
                    reason: ExitReason::TakeProfit,
                });
            }
            return Some(ExitFill {
                price: if stop_gapped { bar.open } else { stop },
                reason: ExitReason::StopLoss,
            });
        }

        if stop_touched {
            return Some(ExitFill {
                price: if stop_gapped { bar.open } else { stop },
                reason: ExitReason::StopLoss,
            });
        }

        target.map(|t| ExitFill {
            price: if target_gapped { bar.open } else { t },
            reason: ExitReason::TakeProfit,
        })
    }
}

/// Take-profit level for an entry: `ratio` multiples of the stop distance
/// on the favorable side of the entry.
pub fn target_price(side: Side, entry_price: f64, stop_price: f64, ratio: f64) -> f64 {
    let stop_distance = (entry_price - stop_price).abs();
    entry_price + side.sign() * stop_distance * ratio
}
