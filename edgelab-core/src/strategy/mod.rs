//! Strategy — the pluggable signal-producing capability.
//!
//! The engine calls into a strategy once per bar; the strategy sees price
//! history up to and including the current bar, never beyond it. Strategies
//! carry their own internal state and emit at most one signal per bar.

pub mod buy_and_hold;
pub mod ma_crossover;

pub use buy_and_hold::BuyAndHold;
pub use ma_crossover::MaCrossover;

use crate::domain::{Bar, Signal};

/// Signal-producing capability consumed by the trade simulator.
///
/// # Responsibilities
/// - Emit entry/exit intent from price history and internal state
///
/// # Non-Responsibilities
/// - Strategies do NOT size orders (sizer's job)
/// - Strategies do NOT place stops (exit manager's job)
/// - Strategies never see portfolio state, so they cannot condition on
///   equity — that separation keeps runs reproducible
pub trait Strategy: Send {
    /// Evaluate the bar at `index`. `bars[..=index]` is visible history.
    fn on_bar(&mut self, bars: &[Bar], index: usize) -> Option<Signal>;

    /// Bars of history required before the first meaningful evaluation.
    fn warmup_bars(&self) -> usize {
        0
    }

    /// Strategy name for reports and logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalDirection;
    use chrono::{TimeZone, Utc};

    struct AlwaysLong;

    impl Strategy for AlwaysLong {
        fn on_bar(&mut self, bars: &[Bar], index: usize) -> Option<Signal> {
            Some(Signal::new(bars[index].timestamp, SignalDirection::Long))
        }

        fn name(&self) -> &str {
            "always_long"
        }
    }

    #[test]
    fn strategy_trait_object_builds() {
        let mut strategy: Box<dyn Strategy> = Box::new(AlwaysLong);
        let bars = vec![Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 1_000.0,
        }];
        let signal = strategy.on_bar(&bars, 0).unwrap();
        assert_eq!(signal.direction, SignalDirection::Long);
    }
}
