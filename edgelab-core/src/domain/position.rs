//! Position — an open holding, owned exclusively by the simulator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side of a position or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. Used in signed P&L arithmetic.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// An open position.
///
/// Exists from the bar an entry fills until the bar it closes. Trailing-stop
/// state (`best_favorable`) is carried here rather than recomputed from
/// price history each bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
    pub quantity: f64,
    pub stop_price: f64,
    pub target_price: Option<f64>,
    /// Best price seen since entry in the favorable direction:
    /// highest high for longs, lowest low for shorts. Seeded with the
    /// entry price. Trailing stops ratchet off this value.
    pub best_favorable: f64,
}

impl Position {
    /// Mark-to-market value of the position at `price` (signed).
    pub fn market_value(&self, price: f64) -> f64 {
        self.side.sign() * self.quantity * price
    }

    /// Unrealized P&L at `price`, before costs.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * self.quantity * (price - self.entry_price)
    }

    /// Update the favorable high-water mark from a bar's extremes.
    pub fn update_best_favorable(&mut self, high: f64, low: f64) {
        match self.side {
            Side::Long => {
                if high > self.best_favorable {
                    self.best_favorable = high;
                }
            }
            Side::Short => {
                if low < self.best_favorable {
                    self.best_favorable = low;
                }
            }
        }
    }
}
