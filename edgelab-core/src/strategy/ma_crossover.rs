//! Moving-average crossover strategy.

use crate::domain::{Bar, Signal, SignalDirection};
use crate::indicators::sma;
use crate::strategy::Strategy;

/// Classic two-SMA crossover: long when the short average crosses above the
/// long average, flat (or short) when it crosses back under.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    short_period: usize,
    long_period: usize,
    /// When false, a cross-down emits Short instead of Flat.
    long_only: bool,
    prev_diff: Option<f64>,
}

impl MaCrossover {
    pub fn new(short_period: usize, long_period: usize, long_only: bool) -> Self {
        assert!(
            short_period >= 1 && short_period < long_period,
            "short_period must be >= 1 and < long_period"
        );
        Self {
            short_period,
            long_period,
            long_only,
            prev_diff: None,
        }
    }

    fn ma_diff(&self, bars: &[Bar], index: usize) -> Option<f64> {
        if index + 1 < self.long_period {
            return None;
        }
        let window = &bars[index + 1 - self.long_period..=index];
        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let long = *sma(&closes, self.long_period).last()?;
        let short_closes = &closes[closes.len() - self.short_period..];
        let short = *sma(short_closes, self.short_period).last()?;
        if long.is_nan() || short.is_nan() {
            return None;
        }
        Some(short - long)
    }
}

impl Strategy for MaCrossover {
    fn on_bar(&mut self, bars: &[Bar], index: usize) -> Option<Signal> {
        let diff = self.ma_diff(bars, index)?;
        let prev = self.prev_diff.replace(diff);

        let crossed_up = matches!(prev, Some(p) if p <= 0.0 && diff > 0.0);
        let crossed_down = matches!(prev, Some(p) if p >= 0.0 && diff < 0.0);

        let direction = if crossed_up {
            SignalDirection::Long
        } else if crossed_down {
            if self.long_only {
                SignalDirection::Flat
            } else {
                SignalDirection::Short
            }
        } else {
            return None;
        };

        Some(Signal::new(bars[index].timestamp, direction))
    }

    fn warmup_bars(&self) -> usize {
        self.long_period
    }

    fn name(&self) -> &str {
        "ma_crossover"
    }
}
