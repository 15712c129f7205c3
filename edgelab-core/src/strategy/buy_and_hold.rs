//! Buy-and-hold reference strategy.

use crate::domain::{Bar, Signal, SignalDirection};
use crate::strategy::Strategy;

/// Goes long on the first bar and never signals again. Useful as a
/// benchmark and for exercising the engine without signal logic.
#[derive(Debug, Clone, Default)]
pub struct BuyAndHold {
    entered: bool,
}

impl Strategy for BuyAndHold {
    fn on_bar(&mut self, bars: &[Bar], index: usize) -> Option<Signal> {
        if self.entered {
            return None;
        }
        self.entered = true;
        Some(Signal::new(bars[index].timestamp, SignalDirection::Long))
    }

    fn name(&self) -> &str {
        "buy_and_hold"
    }
}
